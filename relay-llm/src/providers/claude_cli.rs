// llm/providers/claude_cli.rs
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{
    ContentBlock, EngineClient, EngineError, EngineEvent, EngineStream, InvokeOptions, Outcome,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::logging::log_engine_error;
use crate::provider::{EngineInfo, EnvVar};

/// How long to wait for the CLI to exit after it reported its result.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Drives the `claude` command line in `stream-json` print mode.
/// Every invocation is a fresh subprocess; conversation state lives in the
/// CLI's own session files and is restored with `--resume`.
pub struct ClaudeCliEngine {
    executable: PathBuf,
}

impl ClaudeCliEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Create the engine from environment variables
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("CLAUDE_CODE_EXECUTABLE").unwrap_or_else(|_| "claude".to_string()),
        )
    }

    pub fn info() -> EngineInfo {
        EngineInfo {
            name: "claude",
            display_name: "Claude Code CLI",
            env_vars: vec![EnvVar::optional(
                "CLAUDE_CODE_EXECUTABLE",
                "Path to the claude executable (default: claude on PATH)",
            )],
        }
    }

    fn command_args(options: &InvokeOptions) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--permission-mode".to_string(),
            options.permission_mode.as_str().to_string(),
        ];
        if !options.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(options.allowed_tools.join(","));
        }
        if let Some(resume) = &options.resume {
            args.push("--resume".to_string());
            args.push(resume.clone());
        }
        if let Some(append) = &options.append_system_prompt {
            args.push("--append-system-prompt".to_string());
            args.push(append.clone());
        }
        args
    }
}

#[async_trait]
impl EngineClient for ClaudeCliEngine {
    async fn invoke(&self, prompt: &str, options: InvokeOptions) -> Result<EngineStream, EngineError> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(Self::command_args(&options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !options.cwd.as_os_str().is_empty() {
            cmd.current_dir(&options.cwd);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let err = EngineError::Spawn(e);
                log_engine_error(prompt, &options, &err, self.name());
                return Err(err);
            }
        };

        // The prompt goes through stdin so it can never be mistaken for a flag.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Other("engine stdin unavailable".to_string()))?;
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.shutdown().await?;
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Other("engine stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("claude stderr: {}", line);
                }
            });
        }

        let engine_name = self.name();
        let prompt = prompt.to_string();

        let stream = async_stream::stream! {
            let mut child = child;
            let mut lines = BufReader::new(stdout).lines();

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        let err = EngineError::Io(e);
                        log_engine_error(&prompt, &options, &err, engine_name);
                        yield Err(err);
                        return;
                    }
                };

                let events = match parse_line(&line) {
                    Ok(events) => events,
                    Err(err) => {
                        warn!("Unparseable engine output: {}", line);
                        log_engine_error(&prompt, &options, &err, engine_name);
                        yield Err(err);
                        return;
                    }
                };

                for event in events {
                    if event.is_terminal() {
                        reap_in_background(child);
                        yield Ok(event);
                        return;
                    }
                    yield Ok(event);
                }
            }

            // stdout closed without a result message
            let err = match child.wait().await {
                Ok(status) if status.success() => {
                    EngineError::Protocol("engine output ended without a result".to_string())
                }
                Ok(status) => EngineError::ProcessExit { code: status.code() },
                Err(e) => EngineError::Io(e),
            };
            log_engine_error(&prompt, &options, &err, engine_name);
            yield Err(err);
        };

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

/// Give the CLI time to flush its session files after the result line.
/// The child is killed on drop once the grace period runs out.
fn reap_in_background(mut child: Child) {
    tokio::spawn(async move {
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!("claude exited with {}", status),
            Ok(Err(e)) => warn!("Failed to wait for claude: {}", e),
            Err(_) => debug!("claude did not exit within {:?} after its result", EXIT_GRACE),
        }
    });
}

/// One line of `--output-format stream-json`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CliMessage {
    System {
        #[serde(default)]
        subtype: String,
    },
    Assistant {
        message: CliMessageBody,
    },
    User {
        message: CliMessageBody,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
    },
    Result {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        is_error: bool,
        session_id: Option<String>,
        #[serde(default)]
        total_cost_usd: f64,
        #[serde(default)]
        duration_ms: u64,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct CliMessageBody {
    #[serde(default)]
    content: Value,
}

/// Convert one output line into engine events. Blank lines and message
/// types the gateway has no use for produce no events.
fn parse_line(line: &str) -> Result<Vec<EngineEvent>, EngineError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }

    let message: CliMessage = serde_json::from_str(line)?;
    let events = match message {
        CliMessage::System { subtype } => vec![EngineEvent::System { subtype }],
        CliMessage::Assistant { message } => {
            let content = content_blocks(&message.content)
                .filter_map(|block| serde_json::from_value::<ContentBlock>(block.clone()).ok())
                .collect();
            vec![EngineEvent::Assistant { content }]
        }
        CliMessage::User { message } => content_blocks(&message.content)
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_result"))
            .map(|block| EngineEvent::ToolResult {
                tool_use_id: block
                    .get("tool_use_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                content: block.get("content").cloned().unwrap_or(Value::Null),
            })
            .collect(),
        CliMessage::ToolResult { tool_use_id, content } => {
            vec![EngineEvent::ToolResult { tool_use_id, content }]
        }
        CliMessage::Result {
            subtype,
            is_error,
            session_id,
            total_cost_usd,
            duration_ms,
        } => {
            let outcome = if subtype == "success" && !is_error {
                Outcome::Success {
                    resume_token: session_id,
                    total_cost_usd,
                    duration_ms,
                }
            } else {
                Outcome::Failure {
                    reason: if subtype.is_empty() || subtype == "success" {
                        "error".to_string()
                    } else {
                        subtype
                    },
                }
            };
            vec![EngineEvent::Terminal(outcome)]
        }
        CliMessage::Unknown => Vec::new(),
    };
    Ok(events)
}

/// Blocks of a message body; a plain string body has none.
fn content_blocks(content: &Value) -> impl Iterator<Item = &Value> {
    content.as_array().into_iter().flatten()
}
