//! Raw PTY byte stream → clean text.
//!
//! Pure function, no I/O, no shared state. Strips ANSI CSI/OSC sequences and
//! other escapes, drops control characters, and applies carriage-return
//! overwrite semantics so that progress-bar style output collapses to its
//! final state instead of appearing as a run of stale fragments.
//!
//! Each call returns a residual byte fragment the caller must prepend to the
//! next chunk: an incomplete trailing UTF-8 sequence, or a `ESC` / `ESC [`
//! prefix that hasn't seen its terminator yet.

/// Sanitise one chunk of raw PTY output.
///
/// `residue` is whatever the previous call returned; pass `Vec::new()` for
/// the first chunk of a session. Returns `(clean_text, new_residue)`.
pub fn sanitize(residue: Vec<u8>, chunk: &[u8]) -> (String, Vec<u8>) {
    let mut input = residue;
    input.extend_from_slice(chunk);

    let (stripped, escape_residue) = strip_escapes(&input);
    let (complete, utf8_residue) = split_utf8_residue(&stripped);

    let text = String::from_utf8_lossy(complete).into_owned();
    let text = strip_control_chars(&text);
    let text = normalize_line_endings(&text);

    let mut new_residue = utf8_residue.to_vec();
    new_residue.extend_from_slice(&escape_residue);
    (text, new_residue)
}

/// Split off a trailing incomplete UTF-8 sequence, if any.
///
/// Bytes that are invalid *in the middle* of the slice are left in place —
/// they'll be replaced with the Unicode replacement character by the lossy
/// decode. Only a genuinely truncated sequence at the very end (more bytes
/// needed than are available) is held back as residue.
fn split_utf8_residue(bytes: &[u8]) -> (&[u8], &[u8]) {
    match std::str::from_utf8(bytes) {
        Ok(_) => (bytes, &[]),
        Err(e) => match e.error_len() {
            None => {
                let valid_up_to = e.valid_up_to();
                (&bytes[..valid_up_to], &bytes[valid_up_to..])
            }
            Some(_) => (bytes, &[]),
        },
    }
}

// ---------------------------------------------------------------------------
// Escape stripping
// ---------------------------------------------------------------------------

/// Remove CSI, OSC, and two-byte escape sequences from `input`.
///
/// Returns `(clean_bytes, residue)` where `residue` is a trailing, not yet
/// terminated escape sequence (or a lone `ESC`) that must be retried against
/// the next chunk.
fn strip_escapes(input: &[u8]) -> (Vec<u8>, Vec<u8>) {
    const ESC: u8 = 0x1B;
    const BEL: u8 = 0x07;

    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    let len = input.len();

    while i < len {
        if input[i] != ESC {
            out.push(input[i]);
            i += 1;
            continue;
        }

        // `input[i] == ESC` — try to classify the sequence that follows.
        if i + 1 >= len {
            // Lone ESC at the very end of the chunk: might be the start of a
            // sequence split across reads. Hold it as residue.
            return (out, input[i..].to_vec());
        }

        match input[i + 1] {
            b'[' => {
                // CSI: ESC [ params(0x30-0x3F)* intermediates(0x20-0x2F)* final(0x40-0x7E)
                match find_csi_end(input, i + 2) {
                    Some(end) => i = end,
                    None => return (out, input[i..].to_vec()),
                }
            }
            b']' => {
                // OSC: ESC ] ... (BEL | ESC \)
                match find_osc_end(input, i + 2) {
                    Some(end) => i = end,
                    None => return (out, input[i..].to_vec()),
                }
            }
            b if (0x40..=0x5F).contains(&b) => {
                // Two-byte escape (single-shift, index, etc).
                i += 2;
            }
            _ => {
                // Stray ESC with no recognised follower: drop just the ESC.
                i += 1;
            }
        }
        let _ = BEL; // referenced in find_osc_end
    }

    (out, Vec::new())
}

/// Find the index just past a CSI sequence's final byte, starting the scan
/// at `start` (the byte after `ESC [`). Returns `None` if the terminator
/// hasn't arrived yet in this chunk.
fn find_csi_end(input: &[u8], start: usize) -> Option<usize> {
    let mut j = start;
    while j < input.len() && (0x30..=0x3F).contains(&input[j]) {
        j += 1;
    }
    while j < input.len() && (0x20..=0x2F).contains(&input[j]) {
        j += 1;
    }
    if j < input.len() && (0x40..=0x7E).contains(&input[j]) {
        Some(j + 1)
    } else {
        None
    }
}

/// Find the index just past an OSC sequence's terminator (`BEL` or
/// `ESC \`), starting the scan at `start` (the byte after `ESC ]`).
fn find_osc_end(input: &[u8], start: usize) -> Option<usize> {
    const ESC: u8 = 0x1B;
    const BEL: u8 = 0x07;

    let mut j = start;
    while j < input.len() {
        if input[j] == BEL {
            return Some(j + 1);
        }
        if input[j] == ESC {
            if j + 1 < input.len() && input[j + 1] == b'\\' {
                return Some(j + 2);
            }
            // ESC without the `\` yet available — wait for more input.
            return None;
        }
        j += 1;
    }
    None
}

// ---------------------------------------------------------------------------
// Control character stripping
// ---------------------------------------------------------------------------

/// Remove bytes `< 0x20` and `0x7F` except `\n`, `\t`, and `\r`.
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            let b = c as u32;
            !(b < 0x20 && c != '\n' && c != '\t' && c != '\r') && b != 0x7F
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Line-ending normalisation
// ---------------------------------------------------------------------------

/// Apply carriage-return overwrite semantics within each line, and collapse
/// `\r\n` to `\n`.
///
/// Processing is line-by-line on `\n` boundaries (the partial trailing
/// segment with no `\n` yet is treated as its own "line" for CR-overwrite
/// purposes, matching how a terminal redraws an in-progress line). Within a
/// pre-newline run, `\r` marks "start overwriting from here" — only the
/// segment after the *last* `\r` survives.
fn normalize_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut first = true;
    for line in text.split('\n') {
        if !first {
            out.push('\n');
        }
        first = false;

        // `\r\n` became `line` = "...", with no trailing `\r` (split on '\n'
        // already consumed it); a lone `\r` inside the line still needs the
        // overwrite collapse.
        let line = line.strip_suffix('\r').unwrap_or(line);
        let last_segment = line.rsplit('\r').next().unwrap_or("");
        out.push_str(last_segment);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(bytes: &[u8]) -> String {
        sanitize(Vec::new(), bytes).0
    }

    #[test]
    fn passthrough_plain_text() {
        assert_eq!(clean(b"hello\n"), "hello\n");
    }

    #[test]
    fn strips_csi_color() {
        // "\e[31mRED\e[0m\n"
        assert_eq!(clean(b"\x1b[31mRED\x1b[0m\n"), "RED\n");
    }

    #[test]
    fn strips_osc_bel_terminated() {
        assert_eq!(clean(b"\x1b]0;title\x07ok\n"), "ok\n");
    }

    #[test]
    fn strips_osc_st_terminated() {
        assert_eq!(clean(b"\x1b]0;title\x1b\\ok\n"), "ok\n");
    }

    #[test]
    fn strips_stray_esc() {
        assert_eq!(clean(b"a\x1bZb"), "aZb");
    }

    #[test]
    fn strips_two_byte_escape() {
        // ESC followed by a byte in 0x40-0x5F (e.g. 'D' = IND = 0x44).
        assert_eq!(clean(b"a\x1bDb"), "ab");
    }

    #[test]
    fn strips_control_characters_but_keeps_tab_and_newline() {
        assert_eq!(clean(b"a\x07b\tc\n"), "ab\tc\n");
    }

    #[test]
    fn cr_overwrite_collapses_to_last_segment() {
        assert_eq!(clean(b"aaaa\rbbb"), "bbb");
    }

    #[test]
    fn progress_bar_cr_overwrite() {
        assert_eq!(
            clean(b"Progress: 10%\rProgress: 100%\n"),
            "Progress: 100%\n"
        );
    }

    #[test]
    fn crlf_collapses_to_lf() {
        assert_eq!(clean(b"one\r\ntwo\r\n"), "one\ntwo\n");
    }

    #[test]
    fn incomplete_csi_is_carried_as_residue() {
        let (text, residue) = sanitize(Vec::new(), b"before\x1b[31");
        assert_eq!(text, "before");
        assert_eq!(residue, b"\x1b[31");

        let (text2, residue2) = sanitize(residue, b"mAFTER");
        assert_eq!(text2, "AFTER");
        assert!(residue2.is_empty());
    }

    #[test]
    fn incomplete_utf8_is_carried_as_residue() {
        // 3-byte sequence for '€' (0xE2 0x82 0xAC) split across two chunks.
        let (text, residue) = sanitize(Vec::new(), &[b'x', 0xE2, 0x82]);
        assert_eq!(text, "x");
        assert_eq!(residue, vec![0xE2, 0x82]);

        let (text2, residue2) = sanitize(residue, &[0xAC, b'y']);
        assert_eq!(text2, "\u{20AC}y");
        assert!(residue2.is_empty());
    }

    #[test]
    fn no_forbidden_bytes_survive() {
        let raw = b"\x1b[1mhi\x1b[0m\x07\x01\x7F there\r\nok\n";
        let clean = clean(raw);
        for b in clean.bytes() {
            assert!(
                !((b < 0x20 && b != b'\n' && b != b'\t') || b == 0x7F || b == 0x1B),
                "forbidden byte {b:#x} survived sanitisation"
            );
        }
        assert!(!clean.contains('\r'));
    }
}
