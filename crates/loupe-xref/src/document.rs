//! Reconstructed source text and its position-to-offset index.

use loupe_core::SourcePos;
use loupe_corpus::ArchiveId;

/// Maps 1-based (line, column) positions to 0-based character offsets.
///
/// The offset of a position is the sum of the character lengths of every
/// preceding line, plus one per line for its newline, plus the zero-based
/// column. Columns are not checked against the line length; only a line
/// index past the end of the document is an error, and the caller skips
/// that one reference rather than failing the document.
#[derive(Debug, Clone)]
pub struct OffsetIndex {
    line_starts: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OffsetError {
    #[error("line {line} is outside the document ({line_count} lines)")]
    OutOfRange { line: u32, line_count: u32 },
}

impl OffsetIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut offset = 0usize;
        for ch in text.chars() {
            offset += 1;
            if ch == '\n' {
                line_starts.push(offset);
            }
        }
        Self { line_starts }
    }

    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Character offset of a 1-based position.
    pub fn offset(&self, pos: SourcePos) -> Result<usize, OffsetError> {
        let line_index = (pos.line as usize).checked_sub(1);
        match line_index.and_then(|i| self.line_starts.get(i)) {
            Some(start) => Ok(start + pos.col.saturating_sub(1) as usize),
            None => Err(OffsetError::OutOfRange {
                line: pos.line,
                line_count: self.line_count(),
            }),
        }
    }
}

/// One reconstructed source document tied to the class it was produced from.
///
/// Construction normalizes line endings: every run of carriage returns
/// followed by a line feed collapses to a single `\n`, so the offset index
/// counts exactly one character per line break no matter which transformer
/// produced the text.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    text: String,
    class_name: String,
    archive: Option<ArchiveId>,
    index: OffsetIndex,
}

impl SourceDocument {
    pub fn new(
        text: impl Into<String>,
        class_name: impl Into<String>,
        archive: Option<ArchiveId>,
    ) -> Self {
        let text = normalize_newlines(&text.into());
        let index = OffsetIndex::new(&text);
        Self {
            text,
            class_name: class_name.into(),
            archive,
            index,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Internal name of the class this text reconstructs.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Archive the class was loaded from, when it is part of the corpus.
    /// Lookups probe this archive first.
    pub fn archive(&self) -> Option<ArchiveId> {
        self.archive
    }

    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }
}

fn normalize_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_returns = 0usize;
    for ch in text.chars() {
        match ch {
            '\r' => pending_returns += 1,
            '\n' => {
                pending_returns = 0;
                out.push('\n');
            }
            other => {
                for _ in 0..pending_returns {
                    out.push('\r');
                }
                pending_returns = 0;
                out.push(other);
            }
        }
    }
    for _ in 0..pending_returns {
        out.push('\r');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, col: u32) -> SourcePos {
        SourcePos::new(line, col)
    }

    #[test]
    fn offsets_sum_preceding_lines_and_newlines() {
        // Lines of 10 and 0 characters; line 3 col 5 sits at 10+1+0+1+4.
        let index = OffsetIndex::new("aaaaaaaaaa\n\nbbbbbb\n");
        assert_eq!(index.offset(pos(1, 1)), Ok(0));
        assert_eq!(index.offset(pos(2, 1)), Ok(11));
        assert_eq!(index.offset(pos(3, 5)), Ok(16));
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let index = OffsetIndex::new("caf\u{e9} bar\nnext\n");
        // "café bar" is 8 characters even though é is 2 bytes.
        assert_eq!(index.offset(pos(2, 1)), Ok(9));
    }

    #[test]
    fn columns_past_the_line_end_are_not_checked() {
        let index = OffsetIndex::new("ab\ncd\n");
        assert_eq!(index.offset(pos(1, 40)), Ok(39));
    }

    #[test]
    fn lines_past_the_document_are_rejected() {
        let index = OffsetIndex::new("ab\ncd");
        assert_eq!(index.line_count(), 2);
        assert_eq!(
            index.offset(pos(9, 1)),
            Err(OffsetError::OutOfRange {
                line: 9,
                line_count: 2
            })
        );
        assert!(index.offset(pos(0, 1)).is_err());
    }

    #[test]
    fn same_text_indexes_identically() {
        let a = OffsetIndex::new("one\ntwo\nthree\n");
        let b = OffsetIndex::new("one\ntwo\nthree\n");
        for line in 1..=4u32 {
            for col in 1..=8u32 {
                assert_eq!(a.offset(pos(line, col)), b.offset(pos(line, col)));
            }
        }
    }

    #[test]
    fn carriage_return_runs_collapse_into_one_newline() {
        let doc = SourceDocument::new("a\r\nb\r\r\nc", "demo/A", None);
        assert_eq!(doc.text(), "a\nb\nc");
    }

    #[test]
    fn a_lone_carriage_return_is_left_alone() {
        let doc = SourceDocument::new("a\rb", "demo/A", None);
        assert_eq!(doc.text(), "a\rb");
    }
}
