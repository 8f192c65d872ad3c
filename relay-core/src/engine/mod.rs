mod error;
mod events;
mod options;

pub use error::EngineError;
pub use events::{ContentBlock, EngineEvent, Outcome};
pub use options::{InvokeOptions, PermissionMode};

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Ordered, single-pass sequence of events produced by one invocation.
/// Dropping the stream abandons the invocation.
pub type EngineStream = Pin<Box<dyn Stream<Item = Result<EngineEvent, EngineError>> + Send>>;

/// A conversational reasoning engine.
///
/// Each call to `invoke` starts an independent invocation. Conversational
/// continuity across invocations is carried by `InvokeOptions::resume`,
/// which the engine hands back in `Outcome::Success::resume_token`.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Start an invocation. Errors returned here happen before any event
    /// was produced (e.g. the engine could not be started at all).
    async fn invoke(&self, prompt: &str, options: InvokeOptions) -> Result<EngineStream, EngineError>;

    fn name(&self) -> &'static str;
}
