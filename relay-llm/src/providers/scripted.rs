use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use relay_core::{ContentBlock, EngineClient, EngineError, EngineEvent, EngineStream, InvokeOptions, Outcome};

/// An invocation received by a [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedInvocation {
    pub prompt: String,
    pub options: InvokeOptions,
}

/// Engine that replays canned event sequences, one script per invocation,
/// and records what it was asked. Used for offline demos and tests.
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: Mutex<VecDeque<Vec<Result<EngineEvent, EngineError>>>>,
    calls: Mutex<Vec<RecordedInvocation>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the events for the next unscripted invocation.
    pub fn push_script(&self, events: Vec<EngineEvent>) -> &Self {
        self.push_raw(events.into_iter().map(Ok).collect())
    }

    /// Queue a script that may contain stream faults.
    pub fn push_raw(&self, events: Vec<Result<EngineEvent, EngineError>>) -> &Self {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(events);
        self
    }

    /// Queue a plain text reply that ends successfully with `resume_token`.
    pub fn push_reply(&self, text: &str, resume_token: &str) -> &Self {
        self.push_script(vec![
            EngineEvent::Assistant {
                content: vec![ContentBlock::text(text)],
            },
            EngineEvent::Terminal(Outcome::Success {
                resume_token: Some(resume_token.to_string()),
                total_cost_usd: 0.0,
                duration_ms: 0,
            }),
        ])
    }

    pub fn calls(&self) -> Vec<RecordedInvocation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EngineClient for ScriptedEngine {
    async fn invoke(&self, prompt: &str, options: InvokeOptions) -> Result<EngineStream, EngineError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedInvocation {
                prompt: prompt.to_string(),
                options,
            });

        let script = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| EngineError::Other("no scripted response left".to_string()))?;

        Ok(Box::pin(stream::iter(script)))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_scripts_in_order_and_records_calls() {
        let engine = ScriptedEngine::new();
        engine.push_reply("one", "r1").push_reply("two", "r2");

        let first: Vec<_> = engine
            .invoke("a", InvokeOptions::default())
            .await
            .unwrap()
            .collect()
            .await;
        let _ = engine
            .invoke("b", InvokeOptions::default().with_resume(Some("r1".into())))
            .await
            .unwrap();

        assert!(matches!(
            first[0],
            Ok(EngineEvent::Assistant { ref content }) if content == &vec![ContentBlock::text("one")]
        ));

        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].prompt, "a");
        assert_eq!(calls[1].options.resume.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn exhausted_script_queue_is_an_error() {
        let engine = ScriptedEngine::new();
        assert!(engine.invoke("a", InvokeOptions::default()).await.is_err());
        assert_eq!(engine.calls().len(), 1);
    }
}
