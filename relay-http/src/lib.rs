pub mod apis;
pub mod error;
pub mod http;
pub mod session;
pub mod streaming;
pub mod translator;

pub use error::{ApiError, ApiJson, ErrorResponse};
pub use http::{router, start_server, ChatDefaults, ServerConfig, ServerState};
pub use session::{Session, SessionStore, SessionStoreConfig, Turn};
pub use streaming::{create_sse_stream, EventFormatter};
pub use translator::{translate, StreamTranslator, WireFrame, UNEXPECTED_TERMINATION};
