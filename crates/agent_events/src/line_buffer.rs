/// Reassembles arbitrary stdout chunks into complete, trimmed, non-blank lines.
///
/// `\r\n`, `\r` and `\n` all terminate a line. A trailing `\r` is treated as a complete
/// terminator; a `\n` arriving in the next chunk only yields a blank line, which is dropped,
/// so the emitted sequence does not depend on where chunk boundaries fall.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    tail: String,
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text and returns every line completed by it.
    pub fn consume(&mut self, chunk: &str) -> Vec<String> {
        self.tail.push_str(chunk);
        self.drain_complete()
    }

    /// Byte variant of [`LineBuffer::consume`].
    ///
    /// A multi-byte UTF-8 sequence split across chunks is held until it completes; invalid
    /// sequences decode to U+FFFD.
    pub fn consume_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let decoded = take_valid_utf8(&mut self.pending);
        self.tail.push_str(&decoded);
        self.drain_complete()
    }

    /// Returns the trimmed unterminated tail, if non-blank, and clears it.
    pub fn flush(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = String::from_utf8_lossy(&self.pending).into_owned();
            self.tail.push_str(&rest);
            self.pending.clear();
        }
        let tail = std::mem::take(&mut self.tail);
        let trimmed = tail.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Text received after the last terminator.
    pub fn tail(&self) -> &str {
        &self.tail
    }

    fn drain_complete(&mut self) -> Vec<String> {
        let Some(last_break) = self.tail.rfind(is_line_break) else {
            return Vec::new();
        };
        // Both terminator characters are single-byte.
        let rest = self.tail.split_off(last_break + 1);
        let complete = std::mem::replace(&mut self.tail, rest);
        split_lines(&complete)
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn take_valid_utf8(pending: &mut Vec<u8>) -> String {
    let mut decoded = String::new();
    let mut start = 0;
    while start < pending.len() {
        match std::str::from_utf8(&pending[start..]) {
            Ok(valid) => {
                decoded.push_str(valid);
                start = pending.len();
            }
            Err(err) => {
                let valid_end = start + err.valid_up_to();
                decoded.push_str(std::str::from_utf8(&pending[start..valid_end]).unwrap_or_default());
                match err.error_len() {
                    Some(len) => {
                        decoded.push(char::REPLACEMENT_CHARACTER);
                        start = valid_end + len;
                    }
                    None => {
                        start = valid_end;
                        break;
                    }
                }
            }
        }
    }
    pending.drain(..start);
    decoded
}

/// Splits on `\r\n`, `\r` or `\n`, keeping blank segments (including the one after a
/// trailing terminator) so callers can number lines.
pub fn split_lines(text: &str) -> SplitLines<'_> {
    SplitLines { rest: Some(text) }
}

#[derive(Debug, Clone)]
pub struct SplitLines<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for SplitLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match rest.find(is_line_break) {
            None => {
                self.rest = None;
                Some(rest)
            }
            Some(idx) => {
                let width = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = Some(&rest[idx + width..]);
                Some(&rest[..idx])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(chunks: &[&str]) -> Vec<String> {
        let mut buffer = LineBuffer::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(buffer.consume(chunk));
        }
        lines.extend(buffer.flush());
        lines
    }

    #[test]
    fn holds_incomplete_lines_until_terminated() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.consume("{\"type\":").is_empty());
        assert_eq!(buffer.tail(), "{\"type\":");
        assert_eq!(buffer.consume("\"a\"}\n{\"b\""), vec!["{\"type\":\"a\"}"]);
        assert_eq!(buffer.flush().as_deref(), Some("{\"b\""));
    }

    #[test]
    fn mixed_terminators_and_blank_lines() {
        let lines = feed_all(&["one\r\ntwo\rthree\n\n  \r\n four \n"]);
        assert_eq!(lines, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn chunk_boundaries_do_not_change_output() {
        let input = "{\"a\":1}\r\n\r{\"b\":2}\n  {\"c\":3}  \r\n{\"d\":4}";
        let expected = feed_all(&[input]);
        assert_eq!(expected.len(), 4);
        for split in 0..=input.len() {
            if !input.is_char_boundary(split) {
                continue;
            }
            let (head, tail) = input.split_at(split);
            assert_eq!(feed_all(&[head, tail]), expected, "split at {split}");
        }
        let singles: Vec<String> = input.chars().map(String::from).collect();
        let singles: Vec<&str> = singles.iter().map(String::as_str).collect();
        assert_eq!(feed_all(&singles), expected);
    }

    #[test]
    fn flush_is_idempotent() {
        let mut buffer = LineBuffer::new();
        buffer.consume("  tail  ");
        assert_eq!(buffer.flush().as_deref(), Some("tail"));
        assert_eq!(buffer.flush(), None);

        buffer.consume("   \t ");
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn utf8_sequences_split_across_chunks() {
        let bytes = "{\"text\":\"héllo ✓\"}\n".as_bytes();
        for split in 0..=bytes.len() {
            let mut buffer = LineBuffer::new();
            let mut lines = buffer.consume_bytes(&bytes[..split]);
            lines.extend(buffer.consume_bytes(&bytes[split..]));
            assert_eq!(lines, vec!["{\"text\":\"héllo ✓\"}"], "split at {split}");
        }
    }

    #[test]
    fn invalid_utf8_becomes_replacement_character() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.consume_bytes(b"ab\xffcd\n");
        assert_eq!(lines, vec!["ab\u{fffd}cd"]);
    }

    #[test]
    fn split_lines_keeps_blank_segments() {
        let parts: Vec<&str> = split_lines("a\r\n\rb\n").collect();
        assert_eq!(parts, vec!["a", "", "b", ""]);
    }
}
