use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One block of an assistant message, in the order the engine emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        /// Token to pass as `InvokeOptions::resume` on the next invocation.
        resume_token: Option<String>,
        total_cost_usd: f64,
        duration_ms: u64,
    },
    Failure {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Assistant { content: Vec<ContentBlock> },
    ToolResult { tool_use_id: String, content: Value },
    /// Informational engine status (session init and the like).
    System { subtype: String },
    /// Always the last event of an invocation.
    Terminal(Outcome),
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::Terminal(_))
    }
}
