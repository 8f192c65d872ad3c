pub mod engine;

pub use engine::{
    ContentBlock, EngineClient, EngineError, EngineEvent, EngineStream, InvokeOptions, Outcome,
    PermissionMode,
};
