//! Newline framing for decoder output streams.
//!
//! Each output stream gets its own [`LineFramer`]. Chunks arrive with
//! arbitrary boundaries; complete lines come out in arrival order and a
//! partial line is held back until its terminator (or end of stream) shows up.

/// Splits a byte stream into lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    ///
    /// Lines are returned without `\n`; a trailing `\r` is stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush whatever is left at end of stream as a final line.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_chunk_multiple_lines() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"one\ntwo\r\nthree\n");
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"!AIVDM,1,1,,A,15M6").is_empty());
        assert!(framer.push(b"7FC000G?ufbE`FcDFm?Q00000,0*5E\r").is_empty());
        let lines = framer.push(b"\nrtl_ais: tuned\n");
        assert_eq!(
            lines,
            vec![
                "!AIVDM,1,1,,A,15M67FC000G?ufbE`FcDFm?Q00000,0*5E",
                "rtl_ais: tuned",
            ]
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_tail() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"first\nsecond"), vec!["first"]);
        assert_eq!(framer.finish(), Some("second".to_string()));
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_crlf_split_between_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"abc\r").is_empty());
        assert_eq!(framer.push(b"\n"), vec!["abc"]);
    }

    #[test]
    fn test_empty_lines_preserved() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"a\n\nb\n"), vec!["a", "", "b"]);
    }
}
