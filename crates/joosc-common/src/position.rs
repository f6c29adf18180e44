//! Byte offset -> (line, column) conversion.
//!
//! Built lazily: the driver only pays the cost of indexing newlines when a
//! diagnostic actually needs to render a line/column pair.

/// 1-based line/column position, matching how editors and `javac`-style
/// diagnostics report locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets into a source buffer to [`Position`]s.
///
/// Built once per file on first use and cached on the `SourceFile`.
pub struct LineMap {
    /// Byte offset of the start of each line; `line_starts[0] == 0`.
    line_starts: Vec<u32>,
    text_len: u32,
}

impl LineMap {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        LineMap { line_starts, text_len: text.len() as u32 }
    }

    /// Convert a byte offset to a 1-based (line, column) pair.
    pub fn position(&self, offset: u32) -> Position {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        Position {
            line: (line_idx + 1) as u32,
            column: offset - line_start + 1,
        }
    }

    /// Byte span of the full line containing `offset`, excluding the
    /// trailing newline.
    pub fn line_span(&self, offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let start = self.line_starts[line_idx];
        let end = self
            .line_starts
            .get(line_idx + 1)
            .map(|&next| next.saturating_sub(1))
            .unwrap_or(self.text_len);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_first_column() {
        let m = LineMap::new("abc\ndef\n");
        assert_eq!(m.position(0), Position { line: 1, column: 1 });
        assert_eq!(m.position(2), Position { line: 1, column: 3 });
    }

    #[test]
    fn position_after_newline_is_next_line() {
        let m = LineMap::new("abc\ndef\n");
        assert_eq!(m.position(4), Position { line: 2, column: 1 });
        assert_eq!(m.position(6), Position { line: 2, column: 3 });
    }

    #[test]
    fn line_span_excludes_newline() {
        let m = LineMap::new("abc\ndef\n");
        assert_eq!(m.line_span(5), (4, 7));
    }
}
