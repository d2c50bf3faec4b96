//! pty-core — PTY session management with sentinel-based command completion
//! detection.
//!
//! Provides a `SessionManager` that opens and multiplexes PTY-backed child
//! processes (`PtySession`), each with its own bounded scrollback buffer,
//! optional log mirror, and idle-timeout watchdog. Output is sanitised as
//! it streams off the PTY: ANSI/control sequences are stripped, carriage
//! returns collapse progress-bar-style overwrites, and line endings are
//! normalised.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pty_core::manager::SessionManager;
//! use pty_core::types::SessionConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mgr = SessionManager::new(16, None);
//!     let id = mgr.create(SessionConfig::default()).await.unwrap();
//!     let session = mgr.get(&id).await.unwrap();
//!     let outcome = session.run_command("echo hello", Duration::from_secs(5)).await.unwrap();
//!     println!("{}", outcome.output);
//! }
//! ```

pub mod buffer;
pub mod error;
pub mod log_writer;
pub mod manager;
pub mod sanitizer;
pub mod session;
pub mod types;

pub use error::{CoreError, Result};
pub use manager::SessionManager;
pub use session::PtySession;
pub use types::{RunCommandOutcome, SessionConfig, SessionId, SessionInfo, SessionStatus};
