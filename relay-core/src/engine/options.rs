use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Whether side-effecting actions need approval before the engine runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Every side-effecting action requires manual approval.
    Default,
    /// File edits are accepted automatically.
    #[default]
    AcceptEdits,
    /// Nothing requires approval.
    BypassPermissions,
    /// Read-only planning, no side effects are executed.
    Plan,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" | "manual" => Ok(PermissionMode::Default),
            "acceptEdits" | "accept-edits" => Ok(PermissionMode::AcceptEdits),
            "bypassPermissions" | "bypass" => Ok(PermissionMode::BypassPermissions),
            "plan" => Ok(PermissionMode::Plan),
            other => Err(format!("unknown permission mode: {}", other)),
        }
    }
}

/// Options for a single engine invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvokeOptions {
    /// Tool names the engine may use. Empty means the engine's own default set.
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    /// Resume token from the previous successful invocation of the conversation.
    pub resume: Option<String>,
    /// Working directory the engine operates in.
    pub cwd: PathBuf,
    /// Extra text appended to the engine's system prompt.
    pub append_system_prompt: Option<String>,
}

impl InvokeOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Default::default()
        }
    }

    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    pub fn with_resume(mut self, resume: Option<String>) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_system_prompt_append(mut self, append: impl Into<String>) -> Self {
        self.append_system_prompt = Some(append.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_mode_parses_engine_and_friendly_names() {
        assert_eq!("acceptEdits".parse::<PermissionMode>(), Ok(PermissionMode::AcceptEdits));
        assert_eq!("manual".parse::<PermissionMode>(), Ok(PermissionMode::Default));
        assert_eq!("bypass".parse::<PermissionMode>(), Ok(PermissionMode::BypassPermissions));
        assert!("yolo".parse::<PermissionMode>().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let opts = InvokeOptions::new("/tmp")
            .with_allowed_tools(["Read", "Bash"])
            .with_permission_mode(PermissionMode::Plan)
            .with_resume(Some("r1".to_string()));

        assert_eq!(opts.allowed_tools, vec!["Read".to_string(), "Bash".to_string()]);
        assert_eq!(opts.permission_mode, PermissionMode::Plan);
        assert_eq!(opts.resume.as_deref(), Some("r1"));
        assert_eq!(opts.append_system_prompt, None);
    }
}
