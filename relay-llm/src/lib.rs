pub mod logging;
pub mod provider;
pub mod providers;

pub use provider::{available_engines, engine_from_env, EngineInfo, EnvVar};
pub use providers::claude_cli::ClaudeCliEngine;
pub use providers::scripted::{RecordedInvocation, ScriptedEngine};

pub use relay_core::{
    ContentBlock, EngineClient, EngineError, EngineEvent, EngineStream, InvokeOptions, Outcome,
    PermissionMode,
};
