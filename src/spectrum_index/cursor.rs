//! # Index cursor
//!
//! One forward traversal protocol over both index representations. The general index is
//! walked through its spectrum order and bucket table, the contiguous index by plain
//! arithmetic; callers only see [`IndexCursor::current`], [`IndexCursor::advance`] and
//! [`IndexCursor::at_end`].
//!
//! A cursor yields one *representative* entry per spectrum: the spectrum together with its
//! first detector. Advancing a cursor that is already at the end is a no-op, and `current`
//! keeps answering `None` there.
//!
//! Two cursors compare equal when they sit on the same logical entry (or are both at the
//! end), whichever index they walk.

use super::general::GeneralIndex;
use super::range::RangeIndex;
use super::IndexEntry;

#[derive(Debug, Clone)]
pub enum IndexCursor<'a> {
    General {
        index: &'a GeneralIndex,
        position: usize,
    },
    Range {
        index: RangeIndex,
        offset: i64,
    },
}

impl<'a> IndexCursor<'a> {
    pub(crate) fn general(index: &'a GeneralIndex) -> Self {
        IndexCursor::General { index, position: 0 }
    }

    pub(crate) fn range(index: RangeIndex) -> Self {
        IndexCursor::Range { index, offset: 0 }
    }

    /// Entry under the cursor, `None` once the cursor is exhausted.
    pub fn current(&self) -> Option<IndexEntry> {
        match self {
            IndexCursor::General { index, position } => index.representative(*position),
            IndexCursor::Range { index, offset } => index.entry_at(*offset),
        }
    }

    /// Step to the next representative entry. Idempotent at the end.
    pub fn advance(&mut self) {
        if self.at_end() {
            return;
        }
        match self {
            IndexCursor::General { position, .. } => *position += 1,
            IndexCursor::Range { offset, .. } => *offset += 1,
        }
    }

    pub fn at_end(&self) -> bool {
        self.current().is_none()
    }

    /// Rewind to the first entry.
    pub fn restart(&mut self) {
        match self {
            IndexCursor::General { position, .. } => *position = 0,
            IndexCursor::Range { offset, .. } => *offset = 0,
        }
    }
}

impl PartialEq for IndexCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.current() == other.current()
    }
}

impl Iterator for IndexCursor<'_> {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        let entry = self.current()?;
        self.advance();
        Some(entry)
    }
}

#[cfg(test)]
mod cursor_test {
    use super::*;

    #[test]
    fn test_range_cursor_walks_then_stays_terminal() {
        let index = RangeIndex::new(0, 4).unwrap();
        let mut cursor = IndexCursor::range(index);
        let mut seen = Vec::new();
        while !cursor.at_end() {
            let entry = cursor.current().unwrap();
            seen.push((entry.spectrum, entry.detector));
            cursor.advance();
        }
        assert_eq!(seen, vec![(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)]);

        cursor.advance();
        cursor.advance();
        assert!(cursor.at_end());
        assert_eq!(cursor.current(), None);

        cursor.restart();
        assert_eq!(cursor.current(), Some(IndexEntry::new(0, 0)));
    }

    #[test]
    fn test_general_cursor_yields_first_detector_in_insertion_order() {
        let index = GeneralIndex::from_pairs(&[9, 3, 9, 5], &[90, 30, 91, 50]).unwrap();
        let entries: Vec<_> = IndexCursor::general(&index).collect();
        assert_eq!(
            entries,
            vec![
                IndexEntry::new(9, 90),
                IndexEntry::new(3, 30),
                IndexEntry::new(5, 50)
            ]
        );
    }

    #[test]
    fn test_cross_variant_equality_by_position() {
        let general = GeneralIndex::from_pairs(&[0, 1], &[0, 1]).unwrap();
        let range = RangeIndex::new(0, 1).unwrap();

        let mut a = IndexCursor::general(&general);
        let mut b = IndexCursor::range(range);
        assert_eq!(a, b);

        a.advance();
        assert_ne!(a, b);
        b.advance();
        assert_eq!(a, b);

        a.advance();
        b.advance();
        b.advance();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_general_cursor_starts_at_end() {
        let index = GeneralIndex::new();
        let mut cursor = IndexCursor::general(&index);
        assert!(cursor.at_end());
        cursor.advance();
        assert!(cursor.at_end());
    }
}
