//! Error types for the pty-core crate.

use thiserror::Error;

/// All errors a session or the manager can return to a caller.
///
/// These are behavioural kinds, not wire codes — `code()` below maps each
/// variant to the stable string a façade can forward to its own caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A supplied `SessionConfig` (or process config) was missing a
    /// required field or had a value of the wrong shape.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The manager is already running `max_sessions` sessions.
    #[error("capacity exceeded: {current}/{max} sessions running")]
    CapacityExceeded { current: usize, max: usize },

    /// PTY allocation or child-process fork/exec failed.
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    /// No session exists with the given ID.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The session exists but is not in the `running` state.
    #[error("session not running: {0}")]
    SessionNotRunning(String),

    /// A sentinel template failed validation (missing or duplicated
    /// `{sentinel}` placeholder).
    #[error("invalid sentinel template: {0}")]
    InvalidSentinel(String),

    /// The operation's deadline elapsed before completion was observed.
    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The operation was cancelled before it could complete.
    #[error("operation cancelled")]
    Cancelled,

    /// Underlying I/O failure (read, write, flush, open).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Stable, machine-readable error kind. Mirrors the taxonomy named in
    /// the component's error-handling design; idle-timeout is not a
    /// distinct variant here — it is converted into `SessionNotRunning`
    /// at the point a session is observed to have been idle-reaped.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidConfig(_) => "INVALID_CONFIG",
            CoreError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            CoreError::SpawnFailed(_) => "SPAWN_FAILED",
            CoreError::UnknownSession(_) => "UNKNOWN_SESSION",
            CoreError::SessionNotRunning(_) => "SESSION_NOT_RUNNING",
            CoreError::InvalidSentinel(_) => "INVALID_SENTINEL",
            CoreError::Timeout { .. } => "TIMEOUT",
            CoreError::Cancelled => "CANCELLED",
            CoreError::IoError(_) => "IO_ERROR",
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CoreError>;
