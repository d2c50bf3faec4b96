//! Bounded, line-oriented scrollback buffer for a single session.
//!
//! Only ever mutated from the session's read pump; readers take a snapshot
//! under the session's mutex (see `session.rs`).

use std::collections::VecDeque;

/// A ring of at most `capacity` completed lines, plus one not-yet-terminated
/// partial line.
pub struct ScrollbackBuffer {
    capacity: usize,
    lines: VecDeque<String>,
    partial: String,
}

impl ScrollbackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: VecDeque::new(),
            partial: String::new(),
        }
    }

    /// Append sanitised text, splitting it into completed lines plus a new
    /// partial tail.
    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        let mut pieces = text.split('\n');
        // The first piece continues the held partial line.
        if let Some(first) = pieces.next() {
            self.partial.push_str(first);
        }

        // Any further piece means a newline was crossed: the current
        // partial is now a completed line, and the piece becomes the new
        // partial (until the next piece, if any, completes it too).
        for piece in pieces {
            let completed = std::mem::take(&mut self.partial);
            self.push_line(completed);
            self.partial.push_str(piece);
        }
    }

    fn push_line(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// Return the last `n` completed lines (plus the partial, if non-empty),
    /// joined by `\n`. `n = None` returns everything; `n` exceeding the
    /// line count returns all of it.
    pub fn tail(&self, n: Option<usize>) -> String {
        let take = n.unwrap_or(self.lines.len()).min(self.lines.len());
        let skip = self.lines.len() - take;

        let mut out = self
            .lines
            .iter()
            .skip(skip)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        if !self.partial.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.partial);
        }
        out
    }

    /// `true` if `token` appears as a substring of any completed line or the
    /// partial tail.
    pub fn contains(&self, token: &str) -> bool {
        if self.partial.contains(token) {
            return true;
        }
        self.lines.iter().any(|line| line.contains(token))
    }

    /// Number of completed lines currently held (excludes the partial).
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_without_newline_stays_partial() {
        let mut buf = ScrollbackBuffer::new(10);
        buf.append("hello");
        assert_eq!(buf.line_count(), 0);
        assert_eq!(buf.tail(None), "hello");
    }

    #[test]
    fn append_completes_lines_on_newline() {
        let mut buf = ScrollbackBuffer::new(10);
        buf.append("line1\nline2\npart");
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.tail(None), "line1\nline2\npart");
    }

    #[test]
    fn append_across_calls_joins_partial() {
        let mut buf = ScrollbackBuffer::new(10);
        buf.append("hel");
        buf.append("lo\nworld");
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.tail(None), "hello\nworld");
    }

    #[test]
    fn capacity_evicts_oldest_line() {
        let mut buf = ScrollbackBuffer::new(2);
        buf.append("a\nb\nc\n");
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.tail(None), "b\nc");
    }

    #[test]
    fn tail_n_returns_last_n_lines() {
        let mut buf = ScrollbackBuffer::new(10);
        buf.append("a\nb\nc\nd\n");
        assert_eq!(buf.tail(Some(2)), "c\nd");
    }

    #[test]
    fn tail_zero_returns_empty() {
        let mut buf = ScrollbackBuffer::new(10);
        buf.append("a\nb\n");
        assert_eq!(buf.tail(Some(0)), "");
    }

    #[test]
    fn tail_exceeding_contents_returns_all() {
        let mut buf = ScrollbackBuffer::new(10);
        buf.append("a\nb\n");
        assert_eq!(buf.tail(Some(100)), "a\nb");
    }

    #[test]
    fn contains_scans_completed_and_partial() {
        let mut buf = ScrollbackBuffer::new(10);
        buf.append("needle-in-line\npart-needle");
        assert!(buf.contains("needle-in-line"));
        assert!(buf.contains("part-needle"));
        assert!(!buf.contains("missing"));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = ScrollbackBuffer::new(3);
        for i in 0..100 {
            buf.append(&format!("line{i}\n"));
        }
        assert!(buf.line_count() <= 3);
    }
}
