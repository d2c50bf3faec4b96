//! Optional append-only mirror of a session's raw output lines.
//!
//! Best-effort: a write failure disables further logging for that session
//! but never fails the operation that triggered it (spec'd in the error
//! handling design — the log writer is touched only from the read pump).

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// A line-buffered append-only log file for one session.
pub struct LogWriter {
    file: BufWriter<File>,
    disabled: bool,
}

impl LogWriter {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
            disabled: false,
        })
    }

    /// Append `text` and flush immediately (line-buffered semantics). If a
    /// previous write already failed, this is a silent no-op.
    pub fn write(&mut self, text: &str) {
        if self.disabled || text.is_empty() {
            return;
        }
        if self.file.write_all(text.as_bytes()).and_then(|_| self.file.flush()).is_err() {
            tracing::warn!("log writer failed, disabling further writes for this session");
            self.disabled = true;
        }
    }

    /// Flush and drop the underlying file handle.
    pub fn close(mut self) {
        let _ = self.file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_are_appended_and_readable() {
        let dir = std::env::temp_dir().join(format!("pty-core-logtest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.log");

        let mut w = LogWriter::create(&path).unwrap();
        w.write("hello\n");
        w.write("world\n");
        w.close();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello\nworld\n");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_write_is_noop() {
        let dir = std::env::temp_dir().join(format!("pty-core-logtest-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.log");

        let mut w = LogWriter::create(&path).unwrap();
        w.write("");
        w.close();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "");

        std::fs::remove_dir_all(&dir).ok();
    }
}
