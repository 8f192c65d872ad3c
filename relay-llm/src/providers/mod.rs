pub mod claude_cli;
pub mod scripted;
