//! Shared data types for pty-core.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque identifier for a PTY session: 12 lowercase hex characters, unique
/// within the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh ID from a cryptographic source. UUIDv4 already draws
    /// from the OS CSPRNG; truncating its hex form to 12 characters keeps
    /// that property while matching the width spec.
    pub fn new() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..12].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a session. Transitions are monotonic:
/// `Starting -> Running -> Stopping -> Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Starting => "starting",
            SessionStatus::Running => "running",
            SessionStatus::Stopping => "stopping",
            SessionStatus::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Immutable-once-started configuration for a single session.
///
/// Accepted as a loosely-typed JSON argument map by a façade and converted
/// with `serde_json::from_value`; missing fields fall back to the defaults
/// below via `#[serde(default = ...)]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Absolute or PATH-resolvable executable. Defaults to `$SHELL`, falling
    /// back to `/bin/bash`, when omitted.
    #[serde(default)]
    pub command: Option<String>,

    /// Ordered argument list. When empty and `command` contains whitespace,
    /// the command string is POSIX shell-word split: the first token becomes
    /// `command`, the rest become `args` (see `resolve_command`).
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child process. Defaults to the manager
    /// process's own cwd.
    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,

    #[serde(default = "default_buffer_lines")]
    pub buffer_lines: usize,

    #[serde(default = "default_sentinel_template")]
    pub sentinel_template: String,
}

pub fn default_idle_timeout_seconds() -> u64 {
    86_400
}

pub fn default_buffer_lines() -> usize {
    1_000
}

pub fn default_sentinel_template() -> String {
    "echo {sentinel}".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            cwd: None,
            idle_timeout_seconds: default_idle_timeout_seconds(),
            buffer_lines: default_buffer_lines(),
            sentinel_template: default_sentinel_template(),
        }
    }
}

impl SessionConfig {
    /// Resolve the executable and its argument list, applying the
    /// whitespace-splitting rule when `args` is empty and `command`
    /// contains more than one shell word.
    ///
    /// Falls back to `$SHELL`, then `/bin/bash`, when `command` is unset.
    pub fn resolve_command(&self) -> crate::error::Result<(String, Vec<String>)> {
        let command = self
            .command
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/bash".to_string());

        if !self.args.is_empty() {
            return Ok((command, self.args.clone()));
        }

        if command.chars().any(|c| c.is_whitespace()) {
            let mut tokens = shell_words::split(&command)
                .map_err(|e| crate::error::CoreError::InvalidConfig(format!("unparseable command: {e}")))?;
            if tokens.is_empty() {
                return Err(crate::error::CoreError::InvalidConfig(
                    "command resolves to an empty token list".to_string(),
                ));
            }
            let bin = tokens.remove(0);
            return Ok((bin, tokens));
        }

        Ok((command, Vec::new()))
    }
}

/// Validate that `template` contains the literal substring `{sentinel}`
/// exactly once.
pub fn validate_sentinel_template(template: &str) -> crate::error::Result<()> {
    let count = template.matches("{sentinel}").count();
    match count {
        1 => Ok(()),
        0 => Err(crate::error::CoreError::InvalidSentinel(
            "template must contain the literal substring `{sentinel}`".to_string(),
        )),
        _ => Err(crate::error::CoreError::InvalidSentinel(
            "template must contain `{sentinel}` exactly once".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// RunCommandOutcome
// ---------------------------------------------------------------------------

/// Result of `PtySession::run_command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandOutcome {
    /// Output accumulated since the command was submitted, with the
    /// submitted text, the formatted sentinel command, and the bare
    /// sentinel token filtered out.
    pub output: String,
    /// `true` if the deadline elapsed before the sentinel was observed.
    /// `output` still contains whatever accumulated up to that point.
    pub timed_out: bool,
}

// ---------------------------------------------------------------------------
// SessionInfo
// ---------------------------------------------------------------------------

/// Snapshot of a session — returned by `SessionManager::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub command: String,
    pub status: SessionStatus,
    pub seconds_since_last_activity: u64,
    pub buffer_lines: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_twelve_hex_chars() {
        let id = SessionId::new();
        assert_eq!(id.as_str().len(), 12);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_command_splits_whitespace_when_args_empty() {
        let cfg = SessionConfig {
            command: Some("sh -c echo".to_string()),
            ..Default::default()
        };
        let (bin, args) = cfg.resolve_command().unwrap();
        assert_eq!(bin, "sh");
        assert_eq!(args, vec!["-c".to_string(), "echo".to_string()]);
    }

    #[test]
    fn resolve_command_respects_explicit_args() {
        let cfg = SessionConfig {
            command: Some("sh -c echo".to_string()),
            args: vec!["explicit".to_string()],
            ..Default::default()
        };
        let (bin, args) = cfg.resolve_command().unwrap();
        assert_eq!(bin, "sh -c echo");
        assert_eq!(args, vec!["explicit".to_string()]);
    }

    #[test]
    fn resolve_command_handles_quoted_whitespace() {
        let cfg = SessionConfig {
            command: Some(r#"sh -c "echo hi""#.to_string()),
            ..Default::default()
        };
        let (bin, args) = cfg.resolve_command().unwrap();
        assert_eq!(bin, "sh");
        assert_eq!(args, vec!["-c".to_string(), "echo hi".to_string()]);
    }

    #[test]
    fn sentinel_template_requires_placeholder() {
        assert!(validate_sentinel_template("echo {sentinel}").is_ok());
        assert!(validate_sentinel_template("echo hi").is_err());
    }

    #[test]
    fn sentinel_template_rejects_duplicate_placeholder() {
        assert!(validate_sentinel_template("echo {sentinel}{sentinel}").is_err());
    }
}
