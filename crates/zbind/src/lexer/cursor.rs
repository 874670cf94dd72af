//! Byte cursor with rewindable lookahead

use crate::error::Pos;

/// Saved cursor state, restored to undo speculative reads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pos: usize,
    line: u32,
    col: u32,
}

/// Cursor for navigating byte input with position tracking
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Cursor<'a> {
    /// Create cursor from byte slice
    pub const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Get current byte without consuming
    pub fn current(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Read the current byte and move past it
    pub fn next_byte(&mut self) -> Option<u8> {
        let b = self.current()?;
        self.advance();
        Some(b)
    }

    /// Advance cursor by one byte
    pub fn advance(&mut self) {
        if let Some(b) = self.current() {
            self.pos += 1;
            if b == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    /// Advance cursor by `n` bytes, stopping at end of input
    pub fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    /// Skip whitespace
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.current() {
            if b.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Consume byte if it matches
    pub fn consume(&mut self, expected: u8) -> bool {
        if self.current() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Check whether the remaining input starts with `pattern`
    pub fn starts_with(&self, pattern: &[u8]) -> bool {
        self.remaining().starts_with(pattern)
    }

    /// Consume `pattern` if the remaining input starts with it
    pub fn consume_bytes(&mut self, pattern: &[u8]) -> bool {
        if self.starts_with(pattern) {
            self.advance_by(pattern.len());
            true
        } else {
            false
        }
    }

    pub const fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    /// Rewind to a previously taken checkpoint
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.line = checkpoint.line;
        self.col = checkpoint.col;
    }

    /// Get current position
    pub const fn position(&self) -> Pos {
        Pos::new(self.pos, self.line, self.col)
    }

    /// Check if at end of input
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// Get current position index
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Get slice from start to current position
    pub fn slice_from(&self, start: usize) -> &'a [u8] {
        self.input.get(start..self.pos).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_basic() {
        let mut cursor = Cursor::new(b"hello");
        assert_eq!(cursor.current(), Some(b'h'));
        assert_eq!(cursor.next_byte(), Some(b'h'));
        assert_eq!(cursor.current(), Some(b'e'));
    }

    #[test]
    fn test_cursor_whitespace() {
        let mut cursor = Cursor::new(b"  \t\nhello");
        cursor.skip_whitespace();
        assert_eq!(cursor.current(), Some(b'h'));
        assert_eq!(cursor.position().line, 2);
    }

    #[test]
    fn test_cursor_consume() {
        let mut cursor = Cursor::new(b"abc");
        assert!(cursor.consume(b'a'));
        assert!(!cursor.consume(b'z'));
        assert_eq!(cursor.current(), Some(b'b'));
    }

    #[test]
    fn test_cursor_eof() {
        let mut cursor = Cursor::new(b"");
        assert!(cursor.is_eof());
        assert_eq!(cursor.current(), None);
        assert_eq!(cursor.next_byte(), None);
        assert!(cursor.remaining().is_empty());
    }

    #[test]
    fn test_cursor_slice() {
        let mut cursor = Cursor::new(b"hello world");
        let start = cursor.pos();
        cursor.advance_by(3);
        assert_eq!(cursor.slice_from(start), b"hel");
    }

    #[test]
    fn test_checkpoint_restore_rewinds_position() {
        let mut cursor = Cursor::new(b"<!-x\n>");
        cursor.advance();
        let checkpoint = cursor.checkpoint();
        cursor.advance_by(4);
        assert_eq!(cursor.position().line, 2);
        cursor.restore(checkpoint);
        assert_eq!(cursor.current(), Some(b'!'));
        assert_eq!(cursor.position(), Pos::new(1, 1, 2));
    }

    #[test]
    fn test_consume_bytes() {
        let mut cursor = Cursor::new(b"<![CDATA[x]]>");
        assert!(!cursor.consume_bytes(b"<!--"));
        assert!(cursor.consume_bytes(b"<![CDATA["));
        assert_eq!(cursor.current(), Some(b'x'));
    }
}
