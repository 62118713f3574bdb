//! Contiguous one-to-one index: spectrum `s` is read by detector `s` for every `s` in
//! `[start, end]`. Nothing is stored besides the bounds, every query is arithmetic.

use crate::constants::{DetectorId, SpectrumNumber};
use crate::specgeom_errors::SpecGeomError;

use super::IndexEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeIndex {
    start: SpectrumNumber,
    end: SpectrumNumber,
}

impl RangeIndex {
    /// Inclusive range `[start, end]`.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::InvalidArgument`] if `start > end`.
    pub fn new(start: SpectrumNumber, end: SpectrumNumber) -> Result<Self, SpecGeomError> {
        if start > end {
            return Err(SpecGeomError::InvalidArgument(format!(
                "range start {start} is after range end {end}"
            )));
        }
        Ok(RangeIndex { start, end })
    }

    pub fn start(&self) -> SpectrumNumber {
        self.start
    }

    pub fn end(&self) -> SpectrumNumber {
        self.end
    }

    /// Out-of-range values are rejected, never clamped.
    fn check(&self, value: i32) -> Result<i32, SpecGeomError> {
        if (self.start..=self.end).contains(&value) {
            Ok(value)
        } else {
            Err(SpecGeomError::OutOfRange {
                value: value as i64,
                start: self.start as i64,
                end: self.end as i64,
            })
        }
    }

    pub fn ndet(&self, spectrum: SpectrumNumber) -> Result<usize, SpecGeomError> {
        self.check(spectrum).map(|_| 1)
    }

    pub fn detector(&self, spectrum: SpectrumNumber) -> Result<DetectorId, SpecGeomError> {
        self.check(spectrum)
    }

    pub fn spectrum_of(&self, detector: DetectorId) -> Result<SpectrumNumber, SpecGeomError> {
        self.check(detector)
    }

    pub fn contains_spectrum(&self, spectrum: SpectrumNumber) -> bool {
        self.check(spectrum).is_ok()
    }

    pub fn element_count(&self) -> usize {
        (self.end as i64 - self.start as i64 + 1) as usize
    }

    pub fn spectrum_count(&self) -> usize {
        self.element_count()
    }

    /// Entry at `offset` from the start, `None` past the end.
    pub(crate) fn entry_at(&self, offset: i64) -> Option<IndexEntry> {
        let value = self.start as i64 + offset;
        if offset < 0 || value > self.end as i64 {
            return None;
        }
        let value = value as i32;
        Some(IndexEntry {
            spectrum: value,
            detector: value,
        })
    }
}

#[cfg(test)]
mod range_index_test {
    use super::*;

    #[test]
    fn test_counts() {
        let index = RangeIndex::new(0, 4).unwrap();
        assert_eq!(index.element_count(), 5);
        assert_eq!(index.spectrum_count(), 5);
        assert_eq!(index.ndet(2), Ok(1));
        assert_eq!(index.detector(2), Ok(2));
    }

    #[test]
    fn test_out_of_range_is_not_clamped() {
        let index = RangeIndex::new(-2, 2).unwrap();
        assert_eq!(
            index.ndet(3),
            Err(SpecGeomError::OutOfRange {
                value: 3,
                start: -2,
                end: 2
            })
        );
        assert!(index.spectrum_of(-3).is_err());
        assert_eq!(index.spectrum_of(-2), Ok(-2));
    }

    #[test]
    fn test_full_i32_range_does_not_overflow() {
        let index = RangeIndex::new(i32::MAX - 1, i32::MAX).unwrap();
        assert_eq!(index.element_count(), 2);
        assert_eq!(index.entry_at(1).map(|e| e.spectrum), Some(i32::MAX));
        assert_eq!(index.entry_at(2), None);
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(RangeIndex::new(3, 2).is_err());
        assert!(RangeIndex::new(3, 3).is_ok());
    }
}
