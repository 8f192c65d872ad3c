use futures::{Stream, StreamExt};
use relay_core::{ContentBlock, EngineEvent, EngineStream, Outcome};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::session::{InvocationLifecycle, SessionStore, Turn};

/// Reason reported when the engine stream ends or breaks without a terminal event.
pub const UNEXPECTED_TERMINATION: &str = "unexpected-termination";

/// One unit of the client-facing chat protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireFrame {
    /// Newly appended assistant text, never empty.
    Content { content: String },
    Tool { tool: String, input: Value },
    ToolResult {
        #[serde(rename = "toolUseId")]
        tool_use_id: String,
        content: Value,
    },
    Done { cost: f64, duration: u64 },
    Error { error: String },
}

impl WireFrame {
    pub fn error(error: impl Into<String>) -> Self {
        WireFrame::Error { error: error.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WireFrame::Done { .. } | WireFrame::Error { .. })
    }
}

/// Incremental text-diff state of one invocation.
///
/// `accumulated` only ever grows; `flushed_len` marks how much of it the
/// client has already received.
#[derive(Debug, Default)]
pub struct StreamTranslator {
    accumulated: String,
    flushed_len: usize,
}

impl StreamTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text block and return the unflushed delta, if any.
    pub fn push_text(&mut self, text: &str) -> Option<WireFrame> {
        self.accumulated.push_str(text);
        let delta = &self.accumulated[self.flushed_len..];
        if delta.is_empty() {
            return None;
        }
        let frame = WireFrame::Content {
            content: delta.to_string(),
        };
        self.flushed_len = self.accumulated.len();
        Some(frame)
    }

    /// Frames for one assistant message, in block order.
    pub fn push_blocks(&mut self, blocks: Vec<ContentBlock>) -> Vec<WireFrame> {
        blocks
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => self.push_text(&text),
                ContentBlock::ToolUse { name, input, .. } => Some(WireFrame::Tool { tool: name, input }),
            })
            .collect()
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn flushed_len(&self) -> usize {
        self.flushed_len
    }
}

/// Translate one invocation's engine events into wire frames.
///
/// The returned stream pulls one engine event at a time and ends right after
/// its single terminal frame. On success the session's resume token is
/// refreshed and the assistant turn recorded; on failure the session is left
/// as it was. Dropping the stream abandons the invocation.
pub fn translate(
    store: SessionStore,
    lifecycle: InvocationLifecycle,
    events: EngineStream,
) -> impl Stream<Item = WireFrame> + Send + 'static {
    async_stream::stream! {
        let mut lifecycle = lifecycle;
        let mut events = events;
        let mut translator = StreamTranslator::new();
        let session_id = lifecycle.session_id().to_string();

        loop {
            match events.next().await {
                Some(Ok(EngineEvent::Assistant { content })) => {
                    for frame in translator.push_blocks(content) {
                        if let WireFrame::Tool { tool, .. } = &frame {
                            info!("[{}] TOOL {}", session_id, tool);
                        }
                        yield frame;
                    }
                }
                Some(Ok(EngineEvent::ToolResult { tool_use_id, content })) => {
                    debug!("[{}] TOOL RESULT {}", session_id, tool_use_id);
                    yield WireFrame::ToolResult { tool_use_id, content };
                }
                Some(Ok(EngineEvent::System { subtype })) => {
                    debug!("[{}] Engine system event: {}", session_id, subtype);
                }
                Some(Ok(EngineEvent::Terminal(Outcome::Success { resume_token, total_cost_usd, duration_ms }))) => {
                    if let Some(token) = resume_token {
                        if let Err(e) = store.set_resume_token(&session_id, token).await {
                            warn!("[{}] Could not store resume token: {}", session_id, e);
                        }
                    }
                    if let Err(e) = store
                        .append_turn(&session_id, Turn::assistant(translator.accumulated()))
                        .await
                    {
                        warn!("[{}] Could not record assistant turn: {}", session_id, e);
                    }
                    info!("[{}] Completed (cost ${}, {} ms)", session_id, total_cost_usd, duration_ms);
                    lifecycle.finish();
                    yield WireFrame::Done { cost: total_cost_usd, duration: duration_ms };
                    break;
                }
                Some(Ok(EngineEvent::Terminal(Outcome::Failure { reason }))) => {
                    warn!("[{}] Engine reported failure: {}", session_id, reason);
                    lifecycle.finish();
                    yield WireFrame::error(reason);
                    break;
                }
                Some(Err(e)) => {
                    error!("[{}] Engine stream failed: {}", session_id, e);
                    lifecycle.finish();
                    yield WireFrame::error(UNEXPECTED_TERMINATION);
                    break;
                }
                None => {
                    error!("[{}] Engine stream ended without a result", session_id);
                    lifecycle.finish();
                    yield WireFrame::error(UNEXPECTED_TERMINATION);
                    break;
                }
            }
        }
    }
}
