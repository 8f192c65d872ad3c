use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("engine i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed engine output: {0}")]
    Protocol(String),

    #[error("engine exited with status {code:?} before completing")]
    ProcessExit { code: Option<i32> },

    #[error("engine error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Protocol(e.to_string())
    }
}
