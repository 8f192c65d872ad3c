use std::sync::Arc;

use relay_core::{EngineClient, EngineError};

use crate::providers::claude_cli::ClaudeCliEngine;

/// Environment variable understood by an engine provider
#[derive(Debug, Clone)]
pub struct EnvVar {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl EnvVar {
    pub fn required(name: &'static str, description: &'static str) -> Self {
        Self { name, description, required: true }
    }

    pub fn optional(name: &'static str, description: &'static str) -> Self {
        Self { name, description, required: false }
    }
}

/// Static description of an engine provider
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub env_vars: Vec<EnvVar>,
}

/// All engines that can be selected with `RELAY_ENGINE`
pub fn available_engines() -> Vec<EngineInfo> {
    vec![ClaudeCliEngine::info()]
}

/// Build the engine selected by the `RELAY_ENGINE` environment variable
/// (default: `claude`).
pub fn engine_from_env() -> Result<Arc<dyn EngineClient>, EngineError> {
    let name = std::env::var("RELAY_ENGINE").unwrap_or_else(|_| "claude".to_string());
    engine_by_name(&name)
}

pub fn engine_by_name(name: &str) -> Result<Arc<dyn EngineClient>, EngineError> {
    match name.to_lowercase().as_str() {
        "claude" | "claude-cli" => Ok(Arc::new(ClaudeCliEngine::from_env())),
        other => Err(EngineError::Other(format!(
            "unknown engine '{}', available: {}",
            other,
            available_engines()
                .iter()
                .map(|e| e.name)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}
