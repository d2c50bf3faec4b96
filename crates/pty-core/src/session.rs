//! PTY session: one child process plus its PTY master end, a read pump, and
//! sentinel-based command-completion detection.
//!
//! The read pump runs on a dedicated OS thread rather than a Tokio task —
//! blocking I/O off the async runtime, the same reasoning the rest of this
//! crate family uses for PTY reads — so it can keep draining the master
//! while every session's command-issuing side stays async. Completion
//! waiters are woken through a `tokio::sync::Notify` the pump thread can
//! signal without itself running inside a Tokio task.

use crate::buffer::ScrollbackBuffer;
use crate::error::{CoreError, Result};
use crate::log_writer::LogWriter;
use crate::sanitizer;
use crate::types::{validate_sentinel_template, RunCommandOutcome, SessionConfig, SessionId, SessionStatus};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use uuid::Uuid;

/// Bytes read from the PTY master per pump iteration.
const READ_CHUNK: usize = 65_536;

/// A live PTY session.
pub struct PtySession {
    id: SessionId,
    command_display: String,
    idle_timeout: Duration,

    /// Shared with the read pump, which flips this to `stopping`/`stopped`
    /// on its own when it observes EOF or a read error — i.e. the child
    /// exited on its own, not via `stop()`.
    status: Arc<Mutex<SessionStatus>>,
    writer: Mutex<Box<dyn Write + Send>>,
    /// Shared with the read pump so it can close the master fd itself as
    /// part of tearing down after a self-detected child exit.
    master: Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>,
    /// Shared with the read pump so it can reap the child itself after a
    /// self-detected exit, instead of leaving a zombie until `stop()` runs.
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    pid: u32,

    buffer: Arc<Mutex<ScrollbackBuffer>>,
    log_writer: Arc<Mutex<Option<LogWriter>>>,
    last_activity: Arc<Mutex<Instant>>,
    sentinel_template: Mutex<String>,

    /// Woken by the read pump after every append, and once more at shutdown.
    notify: Arc<Notify>,
    /// Serialises `run_command` calls — at most one active command per
    /// session, later callers queue behind the held guard.
    command_lock: tokio::sync::Mutex<()>,
    pump_handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl PtySession {
    /// Allocate a PTY, fork/exec `config`'s command, and start the read
    /// pump. When `log_dir` is given, a log file named after the session's
    /// freshly generated id is opened immediately, so every byte the pump
    /// sees from the very first read is mirrored to it.
    pub fn start(config: SessionConfig, log_dir: Option<&Path>) -> Result<Self> {
        let id = SessionId::new();
        validate_sentinel_template(&config.sentinel_template)?;
        let (bin, args) = config.resolve_command()?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| CoreError::SpawnFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&bin);
        cmd.args(&args);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| CoreError::SpawnFailed(e.to_string()))?;
        drop(pair.slave);

        let pid = child
            .process_id()
            .ok_or_else(|| CoreError::SpawnFailed("child has no process id".to_string()))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| CoreError::SpawnFailed(e.to_string()))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| CoreError::SpawnFailed(e.to_string()))?;

        let log_writer = match log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let basename = std::path::Path::new(&bin)
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("session");
                let filename = format!("pty_{basename}_{id}.log");
                Some(LogWriter::create(&dir.join(filename))?)
            }
            None => None,
        };

        let buffer = Arc::new(Mutex::new(ScrollbackBuffer::new(config.buffer_lines)));
        let log_writer = Arc::new(Mutex::new(log_writer));
        let last_activity = Arc::new(Mutex::new(Instant::now()));
        let notify = Arc::new(Notify::new());
        let status = Arc::new(Mutex::new(SessionStatus::Running));
        let master = Arc::new(Mutex::new(Some(pair.master)));
        let child = Arc::new(Mutex::new(child));

        let pump_handle = spawn_read_pump(
            id.clone(),
            reader,
            Arc::clone(&status),
            Arc::clone(&master),
            Arc::clone(&child),
            Arc::clone(&buffer),
            Arc::clone(&log_writer),
            Arc::clone(&last_activity),
            Arc::clone(&notify),
        );

        let command_display = std::iter::once(bin.clone())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(session_id = %id, command = %command_display, "session started");

        Ok(Self {
            id,
            command_display,
            idle_timeout: Duration::from_secs(config.idle_timeout_seconds),
            status,
            writer: Mutex::new(writer),
            master,
            child,
            pid,
            buffer,
            log_writer,
            last_activity,
            sentinel_template: Mutex::new(config.sentinel_template),
            notify,
            command_lock: tokio::sync::Mutex::new(()),
            pump_handle: Mutex::new(Some(pump_handle)),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn command_display(&self) -> &str {
        &self.command_display
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock().unwrap()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().unwrap().elapsed()
    }

    pub fn buffer_line_count(&self) -> usize {
        self.buffer.lock().unwrap().line_count()
    }

    /// Run `text` to completion, detected by a freshly generated sentinel
    /// token appearing in sanitised output. Only one `run_command` is
    /// active at a time per session — a concurrent call queues behind it.
    pub async fn run_command(&self, text: &str, timeout: Duration) -> Result<RunCommandOutcome> {
        let _guard = self.command_lock.lock().await;
        self.ensure_running()?;

        let token = Uuid::new_v4().simple().to_string();
        let template = self.sentinel_template.lock().unwrap().clone();
        let sentinel_cmd = template.replace("{sentinel}", &token);

        let snapshot = self.buffer.lock().unwrap().tail(None);

        self.write_raw(format!("{text}\n{sentinel_cmd}\n").as_bytes())?;

        let deadline = Instant::now() + timeout;
        loop {
            if self.buffer.lock().unwrap().contains(&token) {
                break;
            }
            if self.status() != SessionStatus::Running {
                // Child exited (or was stopped) before the sentinel showed up.
                let appended = diff_since(&snapshot, &self.buffer.lock().unwrap().tail(None));
                return Ok(RunCommandOutcome { output: appended, timed_out: false });
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let appended = diff_since(&snapshot, &self.buffer.lock().unwrap().tail(None));
                return Ok(RunCommandOutcome { output: appended, timed_out: true });
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }

        let full_tail = self.buffer.lock().unwrap().tail(None);
        let appended = diff_since(&snapshot, &full_tail);
        let truncated = truncate_at_sentinel(&appended, &token);
        let filtered = filter_echoes(&truncated, text, &sentinel_cmd, &token);
        Ok(RunCommandOutcome { output: filtered, timed_out: false })
    }

    /// Write caller-supplied bytes verbatim — no echo filtering, no wait.
    pub fn send_keys(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_running()?;
        self.write_raw(bytes)
    }

    /// Return the buffer's tail snapshot. Allowed regardless of status.
    pub fn get_buffer(&self, n: Option<usize>) -> String {
        self.buffer.lock().unwrap().tail(n)
    }

    /// Atomically swap the sentinel template after validating it.
    pub fn set_sentinel(&self, template: String) -> Result<()> {
        self.ensure_running()?;
        validate_sentinel_template(&template)?;
        *self.sentinel_template.lock().unwrap() = template;
        Ok(())
    }

    /// Transition to `stopping`, SIGTERM then (after a 2s grace period)
    /// SIGKILL the child, then tear down the master/child/log writer and
    /// land on `stopped`. Idempotent — also safe to call after the read
    /// pump has already torn the session down itself (see `spawn_read_pump`)
    /// on a self-detected child exit; the teardown steps are all no-ops the
    /// second time they run.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut st = self.status.lock().unwrap();
            if *st == SessionStatus::Stopped {
                return Ok(());
            }
            *st = SessionStatus::Stopping;
        }

        // SAFETY: `pid` is this session's own child, recorded at spawn time.
        unsafe {
            libc::kill(self.pid as libc::pid_t, libc::SIGTERM);
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            // `Err` here means the child was already reaped (e.g. by the
            // read pump racing this same shutdown), which counts as exited.
            let exited = !matches!(self.child.lock().unwrap().try_wait(), Ok(None));
            if exited || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let still_alive = matches!(self.child.lock().unwrap().try_wait(), Ok(None));
        if still_alive {
            unsafe {
                libc::kill(self.pid as libc::pid_t, libc::SIGKILL);
            }
        }

        let handle = self.pump_handle.lock().unwrap().take();
        if let Some(h) = handle {
            let _ = tokio::task::spawn_blocking(move || h.join()).await;
        }

        reap_and_close(&self.child, &self.master, &self.log_writer);

        *self.status.lock().unwrap() = SessionStatus::Stopped;
        self.notify.notify_waiters();
        tracing::info!(session_id = %self.id, "session stopped");
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.status() == SessionStatus::Running {
            Ok(())
        } else {
            Err(CoreError::SessionNotRunning(self.id.to_string()))
        }
    }

    fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        {
            let mut w = self.writer.lock().unwrap();
            w.write_all(bytes)?;
            w.flush()?;
        }
        *self.last_activity.lock().unwrap() = Instant::now();
        Ok(())
    }
}

/// Drive the read loop for one session. On EOF or a read error — the child
/// exited on its own, not via `stop()` — this thread itself advances the
/// session through `stopping` to `stopped`: reaps the child, closes the
/// master, and flushes the log writer, exactly as `PtySession::stop` would,
/// so `ensure_running` starts rejecting calls immediately rather than
/// waiting for someone to notice and call `stop` explicitly.
#[allow(clippy::too_many_arguments)]
fn spawn_read_pump(
    id: SessionId,
    mut reader: Box<dyn Read + Send>,
    status: Arc<Mutex<SessionStatus>>,
    master: Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    buffer: Arc<Mutex<ScrollbackBuffer>>,
    log_writer: Arc<Mutex<Option<LogWriter>>>,
    last_activity: Arc<Mutex<Instant>>,
    notify: Arc<Notify>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut residue: Vec<u8> = Vec::new();
        let mut raw = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut raw) {
                Ok(0) => break,
                Ok(n) => {
                    let (text, new_residue) = sanitizer::sanitize(residue, &raw[..n]);
                    residue = new_residue;
                    if !text.is_empty() {
                        buffer.lock().unwrap().append(&text);
                        if let Some(w) = log_writer.lock().unwrap().as_mut() {
                            w.write(&text);
                        }
                        *last_activity.lock().unwrap() = Instant::now();
                        notify.notify_waiters();
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %id, "pty read error: {e}");
                    break;
                }
            }
        }
        tracing::debug!(session_id = %id, "pty read pump exited");

        // If `stop()` is already driving this session down, leave status and
        // teardown to it — it holds the same locks and is equally idempotent,
        // but skipping a redundant SIGTERM/SIGKILL avoids signalling a PID
        // that may already have been reused.
        let should_finalize = {
            let mut st = status.lock().unwrap();
            if *st == SessionStatus::Running {
                *st = SessionStatus::Stopping;
                true
            } else {
                false
            }
        };

        if should_finalize {
            reap_and_close(&child, &master, &log_writer);
            *status.lock().unwrap() = SessionStatus::Stopped;
            tracing::info!(session_id = %id, "session stopped (child exited)");
        }

        notify.notify_waiters();
    })
}

/// Reap the child, close the PTY master, and flush the log writer. Callable
/// more than once: a reaped child's second `wait()` and an already-`take`n
/// `Option` are both no-ops.
fn reap_and_close(
    child: &Mutex<Box<dyn Child + Send + Sync>>,
    master: &Mutex<Option<Box<dyn MasterPty + Send>>>,
    log_writer: &Mutex<Option<LogWriter>>,
) {
    let _ = child.lock().unwrap().wait();
    master.lock().unwrap().take();
    if let Some(w) = log_writer.lock().unwrap().take() {
        w.close();
    }
}

/// Newly-appended text since `snapshot`, assuming the buffer's tail still
/// begins with it. If eviction has broken that assumption, conservatively
/// return the whole current tail rather than dropping output.
fn diff_since(snapshot: &str, full: &str) -> String {
    if full.len() >= snapshot.len() && full.starts_with(snapshot) {
        full[snapshot.len()..].to_string()
    } else {
        full.to_string()
    }
}

/// Keep everything up to and including the line containing `token`.
fn truncate_at_sentinel(appended: &str, token: &str) -> String {
    match appended.find(token) {
        Some(idx) => {
            let end = appended[idx..]
                .find('\n')
                .map(|p| idx + p + 1)
                .unwrap_or(appended.len());
            appended[..end].to_string()
        }
        None => appended.to_string(),
    }
}

/// Drop lines that are exact echoes of the submitted text, the formatted
/// sentinel command, or the bare token. Any other divergence is retained —
/// a conservative under-filter rather than dropping real output.
fn filter_echoes(text_block: &str, submitted: &str, sentinel_cmd: &str, token: &str) -> String {
    text_block
        .split('\n')
        .filter(|line| *line != submitted && *line != sentinel_cmd && *line != token)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_since_returns_suffix_when_prefix_matches() {
        assert_eq!(diff_since("abc", "abcdef"), "def");
    }

    #[test]
    fn diff_since_falls_back_to_full_on_mismatch() {
        assert_eq!(diff_since("xyz", "abcdef"), "abcdef");
    }

    #[test]
    fn truncate_keeps_through_sentinel_line() {
        let appended = "hello\nTOKEN123\nmore after\n";
        assert_eq!(truncate_at_sentinel(appended, "TOKEN123"), "hello\nTOKEN123\n");
    }

    #[test]
    fn truncate_passthrough_when_token_absent() {
        assert_eq!(truncate_at_sentinel("no token here", "TOKEN"), "no token here");
    }

    #[test]
    fn filter_echoes_drops_exact_matches_only() {
        let block = "echo hello\nhello\necho TOKEN\nTOKEN\n";
        let out = filter_echoes(block, "echo hello", "echo TOKEN", "TOKEN");
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn filter_echoes_retains_everything_else() {
        let block = "echo hello\nhello world\n";
        let out = filter_echoes(block, "echo hello", "echo TOKEN", "TOKEN");
        assert_eq!(out, "hello world\n");
    }
}
