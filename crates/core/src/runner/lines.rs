//! Incremental line splitting for process output.

/// Splits a byte stream into lines on `\n` or `\r`.
///
/// Encoder tools redraw their status line with a bare carriage return, so a
/// plain `lines()` reader would hold the whole run in a single "line".
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the complete, non-empty lines it closed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.take_line(&mut lines);
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Returns the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        self.take_line(&mut lines);
        lines.pop()
    }

    fn take_line(&mut self, lines: &mut Vec<String>) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        if !line.is_empty() {
            lines.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_newline_and_carriage_return() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"frame=1 time=00:00:01.00\rframe=2 time=00:00:02.00\r\nDone\n");
        assert_eq!(
            lines,
            vec![
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00",
                "Done"
            ]
        );
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_keeps_partial_line_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"out_time_").is_empty());
        let lines = splitter.push(b"us=1500000\nprogress=");
        assert_eq!(lines, vec!["out_time_us=1500000"]);
        assert_eq!(splitter.finish(), Some("progress=".to_string()));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(&[b'a', 0xff, b'b', b'\n']);
        assert_eq!(lines, vec!["a\u{fffd}b"]);
    }
}
