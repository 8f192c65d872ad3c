pub mod handler;
pub mod types;

pub use handler::{create_session, delete_session, get_session, list_sessions};
pub use types::{
    CreateSessionResponse, DeleteSessionResponse, GetSessionResponse, ListSessionsResponse,
    SessionDetail, SessionListItem, SessionRef,
};
