//! Restartable, lookahead-capable iteration over a byte stream.
//!
//! The parser needs the raw line terminator (`\n`, `\r\n`, `\r`, or none for
//! a final unterminated line) to reproduce target files byte-for-byte, so
//! `next_line` hands back the terminator attached rather than trimmed.

/// A single-slot-pushback cursor over an in-memory byte buffer.
pub struct LineReader<'a> {
    data: &'a [u8],
    pos: usize,
    pushed_back: Option<Vec<u8>>,
}

impl<'a> LineReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            pushed_back: None,
        }
    }

    /// Returns the next line, terminator included, or `None` at end of stream.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        if let Some(line) = self.pushed_back.take() {
            return Some(line);
        }
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        let mut i = start;
        while i < self.data.len() && self.data[i] != b'\n' && self.data[i] != b'\r' {
            i += 1;
        }
        if i < self.data.len() {
            if self.data[i] == b'\r' {
                if i + 1 < self.data.len() && self.data[i + 1] == b'\n' {
                    i += 2;
                } else {
                    i += 1;
                }
            } else {
                i += 1; // '\n'
            }
        }
        let line = self.data[start..i].to_vec();
        self.pos = i;
        Some(line)
    }

    /// Returns the next line without consuming it.
    pub fn peek_line(&mut self) -> Option<Vec<u8>> {
        let line = self.next_line()?;
        self.pushed_back = Some(line.clone());
        Some(line)
    }

    /// Restores a previously consumed line so the next `next_line` returns it again.
    pub fn push_back(&mut self, line: Vec<u8>) {
        self.pushed_back = Some(line);
    }
}

/// Splits a whole buffer into lines, terminators included, using the same
/// rules as `LineReader`. Used by the applier to load a candidate file.
pub fn split_lines(data: &[u8]) -> Vec<Vec<u8>> {
    let mut reader = LineReader::new(data);
    let mut out = Vec::new();
    while let Some(line) = reader.next_line() {
        out.push(line);
    }
    out
}

/// Reassembles lines (terminators included) back into a single buffer.
pub fn assemble(lines: &[Vec<u8>]) -> Vec<u8> {
    lines.concat()
}
