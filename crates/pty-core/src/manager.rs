//! `SessionManager` — owns and multiplexes all active PTY sessions.
//!
//! Callers interact exclusively through this struct. The registry lock is
//! held only briefly, for lookup/insert/remove/enumerate: sessions are
//! cloned out as `Arc<PtySession>` before any await or I/O runs against
//! them, so one session's blocking operation never stalls another's.

use crate::error::{CoreError, Result};
use crate::session::PtySession;
use crate::types::{SessionConfig, SessionId, SessionInfo, SessionStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Manages the set of concurrently open PTY sessions, up to `max_sessions`.
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<SessionId, Arc<PtySession>>>>,
    max_sessions: usize,
    log_dir: Option<PathBuf>,
}

impl SessionManager {
    pub fn new(max_sessions: usize, log_dir: Option<PathBuf>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            max_sessions,
            log_dir,
        }
    }

    /// Start a new session, subject to the capacity limit, and register it.
    /// The registry lock is held across the whole check-construct-insert
    /// sequence: `PtySession::start` is a bounded fork/exec, not ongoing
    /// operational I/O, so this doesn't violate the "never hold the lock
    /// across session I/O" rule that applies to `get`/`remove`/`list`.
    ///
    /// The idle-timeout watchdog is spawned after the session is wrapped in
    /// an `Arc`, from here rather than from inside `PtySession::start`, so
    /// the session never needs a reference back to its own watchdog task.
    pub async fn create(&self, config: SessionConfig) -> Result<SessionId> {
        let mut guard = self.sessions.lock().await;
        if guard.len() >= self.max_sessions {
            return Err(CoreError::CapacityExceeded {
                current: guard.len(),
                max: self.max_sessions,
            });
        }

        let session = Arc::new(PtySession::start(config, self.log_dir.as_deref())?);
        let id = session.id().clone();
        guard.insert(id.clone(), Arc::clone(&session));
        drop(guard);

        spawn_idle_watchdog(Arc::clone(&session), Arc::clone(&self.sessions));

        info!(session_id = %id, "session registered");
        Ok(id)
    }

    pub async fn get(&self, id: &SessionId) -> Result<Arc<PtySession>> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownSession(id.to_string()))
    }

    /// Stop (if running) and forget a session.
    pub async fn remove(&self, id: &SessionId) -> Result<()> {
        let session = {
            let mut guard = self.sessions.lock().await;
            guard.remove(id).ok_or_else(|| CoreError::UnknownSession(id.to_string()))?
        };
        session.stop().await?;
        info!(session_id = %id, "session removed");
        Ok(())
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let guard = self.sessions.lock().await;
        guard
            .values()
            .map(|s| SessionInfo {
                id: s.id().clone(),
                command: s.command_display().to_string(),
                status: s.status(),
                seconds_since_last_activity: s.idle_for().as_secs(),
                buffer_lines: s.buffer_line_count(),
            })
            .collect()
    }

    /// Stop every session concurrently and clear the registry. Used on
    /// process shutdown.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<PtySession>> = {
            let mut guard = self.sessions.lock().await;
            guard.drain().map(|(_, s)| s).collect()
        };
        let stops = sessions.iter().map(|session| async move {
            if let Err(e) = session.stop().await {
                warn!(session_id = %session.id(), error = %e, "error stopping session during shutdown");
            }
        });
        futures_util::future::join_all(stops).await;
    }
}

/// Poll a session's idle time and stop it once it exceeds its configured
/// idle timeout. Runs for the session's lifetime; exits once the session
/// is no longer `Running` (stopped by this watchdog, by `remove`, or by
/// the child exiting on its own).
///
/// Holds its own clone of the registry `Arc` so that, on firing, it can
/// remove the session from `sessions` itself rather than leaving a stopped
/// entry registered forever — the same registry `remove`/`create`/`shutdown`
/// touch, just reached from here instead of routed back through `&self`.
fn spawn_idle_watchdog(
    session: Arc<PtySession>,
    sessions: Arc<Mutex<HashMap<SessionId, Arc<PtySession>>>>,
) {
    let timeout = session.idle_timeout();
    tokio::spawn(async move {
        loop {
            if session.status() != SessionStatus::Running {
                return;
            }
            let idle = session.idle_for();
            if idle >= timeout {
                info!(session_id = %session.id(), "idle timeout exceeded, stopping session");
                let _ = session.stop().await;
                sessions.lock().await.remove(session.id());
                return;
            }
            tokio::time::sleep(poll_interval(timeout - idle)).await;
        }
    });
}

fn poll_interval(remaining: Duration) -> Duration {
    remaining.min(Duration::from_secs(30)).max(Duration::from_millis(100))
}
