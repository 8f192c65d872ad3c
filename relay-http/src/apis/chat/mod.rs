pub mod formatter;
pub mod handler;
pub mod types;

pub use formatter::ChatFormatter;
pub use handler::handle_chat;
pub use types::ChatRequest;
