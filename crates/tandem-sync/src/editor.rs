//! The editor handle the reconciler drives.
//!
//! Change notifications are asynchronous and carry no payload: the host
//! observes the editor firing `change` and calls
//! [`Reconciler::take_user_edits`](crate::Reconciler::take_user_edits) at
//! its leisure. Mutations made *by* the reconciler never notify it back
//! synchronously, and a stale queued notification is harmless because the
//! reconciler re-snapshots and diffs instead of trusting event payloads.

use tandem_core::RowCol;

/// A half-open span of text between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: RowCol,
    pub end: RowCol,
}

/// The capability set the reconciler consumes from a text editor.
///
/// Out-of-range positions are a caller-side invariant; implementations may
/// panic on violation.
pub trait Editor {
    /// Full buffer contents.
    fn value(&self) -> String;

    /// Replace the full buffer contents.
    fn set_value(&mut self, text: &str);

    /// Insert `text` at `pos`.
    fn insert(&mut self, pos: RowCol, text: &str);

    /// Remove the text covered by `span`.
    fn remove(&mut self, span: Span);

    /// Length of the given row, excluding its newline.
    fn line_len(&self, row: usize) -> usize;
}

/// An in-memory [`Editor`] over a plain string.
///
/// This is the reference implementation the test-suite edits "behind the
/// reconciler's back" to stand in for a real widget; it panics on
/// out-of-range coordinates so reconciliation bugs fail loudly.
#[derive(Debug, Default)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new() -> TextBuffer {
        TextBuffer::default()
    }

    /// Char offset of `pos`, allowing the end-of-text position.
    fn offset(&self, pos: RowCol) -> usize {
        let mut row = 0;
        let mut col = 0;
        for (idx, ch) in self.text.chars().enumerate() {
            if row == pos.row && col == pos.col {
                return idx;
            }
            if ch == '\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        if row == pos.row && col == pos.col {
            return self.text.chars().count();
        }
        panic!("position {pos:?} out of range for {:?}", self.text);
    }

    fn byte_at(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(byte, _)| byte)
            .unwrap_or(self.text.len())
    }
}

impl Editor for TextBuffer {
    fn value(&self) -> String {
        self.text.clone()
    }

    fn set_value(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn insert(&mut self, pos: RowCol, text: &str) {
        let at = self.byte_at(self.offset(pos));
        self.text.insert_str(at, text);
    }

    fn remove(&mut self, span: Span) {
        let start = self.byte_at(self.offset(span.start));
        let end = self.byte_at(self.offset(span.end));
        assert!(start <= end, "inverted span {span:?}");
        self.text.replace_range(start..end, "");
    }

    fn line_len(&self, row: usize) -> usize {
        match self.text.split('\n').nth(row) {
            Some(line) => line.chars().count(),
            None => panic!("row {row} out of range"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: usize, col: usize) -> RowCol {
        RowCol { row, col }
    }

    #[test]
    fn insert_and_remove() {
        let mut buf = TextBuffer::new();
        buf.set_value("ab\ncd");

        buf.insert(pos(0, 2), "X");
        assert_eq!(buf.value(), "abX\ncd");

        buf.insert(pos(1, 0), "Y");
        assert_eq!(buf.value(), "abX\nYcd");

        buf.remove(Span { start: pos(0, 2), end: pos(0, 3) });
        assert_eq!(buf.value(), "ab\nYcd");

        // Removing a newline merges two rows.
        buf.remove(Span { start: pos(0, 2), end: pos(1, 0) });
        assert_eq!(buf.value(), "abYcd");
    }

    #[test]
    fn insert_at_end() {
        let mut buf = TextBuffer::new();
        buf.set_value("ab");
        buf.insert(pos(0, 2), "c");
        assert_eq!(buf.value(), "abc");
    }

    #[test]
    fn line_len_excludes_newline() {
        let mut buf = TextBuffer::new();
        buf.set_value("ab\n\ncde");
        assert_eq!(buf.line_len(0), 2);
        assert_eq!(buf.line_len(1), 0);
        assert_eq!(buf.line_len(2), 3);
    }

    #[test]
    #[should_panic]
    fn out_of_range_position_panics() {
        let mut buf = TextBuffer::new();
        buf.set_value("ab");
        buf.insert(pos(0, 5), "x");
    }

    #[test]
    fn multibyte_offsets() {
        let mut buf = TextBuffer::new();
        buf.set_value("héllo");
        buf.insert(pos(0, 2), "X");
        assert_eq!(buf.value(), "héXllo");
        buf.remove(Span { start: pos(0, 1), end: pos(0, 2) });
        assert_eq!(buf.value(), "hXllo");
    }
}
