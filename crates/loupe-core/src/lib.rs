//! Core shared types for Loupe.
//!
//! This crate is intentionally small and dependency-free.

use std::fmt;

mod cancel;

pub use cancel::CancellationToken;

/// A position in reconstructed source expressed as 1-based (line, column).
///
/// Columns count characters, not bytes, matching the offset index convention
/// used by the link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePos {
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A half-open span in reconstructed source; `end` points one past the last
/// character.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub start: SourcePos,
    pub end: SourcePos,
}

impl SourceSpan {
    #[inline]
    pub const fn new(start: SourcePos, end: SourcePos) -> Self {
        Self { start, end }
    }
}

impl fmt::Debug for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_order_by_line_then_column() {
        assert!(SourcePos::new(1, 9) < SourcePos::new(2, 1));
        assert!(SourcePos::new(3, 4) < SourcePos::new(3, 5));
    }

    #[test]
    fn span_debug_is_compact() {
        let span = SourceSpan::new(SourcePos::new(2, 5), SourcePos::new(2, 11));
        assert_eq!(format!("{span:?}"), "2:5..2:11");
    }
}
