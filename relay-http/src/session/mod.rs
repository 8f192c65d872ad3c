mod lifecycle;
mod persist;
mod session;
mod store;

pub use lifecycle::{InvocationLifecycle, InvocationLock};
pub use persist::{SessionData, SessionPersist};
pub use session::{Role, Session, SessionSummary, Turn};
pub use store::{SessionError, SessionStore, SessionStoreConfig};
