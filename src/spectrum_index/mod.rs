//! # Spectrum ↔ detector index
//!
//! Relates logical measurement channels (spectra) to the physical sensors (detectors)
//! feeding them. Two representations sit behind the single
//! [`SpectrumDetectorIndex`] type:
//!
//! - [`GeneralIndex`](crate::spectrum_index::general::GeneralIndex) – hash multimap, any
//!   number of detectors per spectrum, and a detector may even be filed under several spectra
//!   (historical files rely on that laxity, so it is preserved).
//! - [`RangeIndex`](crate::spectrum_index::range::RangeIndex) – inclusive range
//!   `[start, end]` where spectrum `s` is read by detector `s`; O(1) everything, no storage.
//!
//! Both present the same read contract (`ndet`, `detectors`, `spectra`, `element_count`,
//! `spectrum_count`, `cursor`) and the same traversal protocol,
//! [`IndexCursor`](crate::spectrum_index::cursor::IndexCursor).
//!
//! ## Lifecycle
//!
//! An index is built privately (edits are only available on the general representation),
//! then published by wrapping it in an `Arc` and installing it in the owning workspace.
//! From then on it is read-only: every query takes `&self`, the type is `Send + Sync`, and
//! concurrent readers need no synchronisation. A mapping change means building a new
//! index and installing it in place of the old one.
//!
//! ## Errors
//!
//! | Situation                                   | General index              | Range index     |
//! |---------------------------------------------|----------------------------|-----------------|
//! | unknown spectrum in `ndet` / `detectors`    | `SpectrumNotFound`         | `OutOfRange`    |
//! | unknown detector in `spectra`               | `UnmappedDetector`         | `OutOfRange`    |
//!
//! Batch lookups are all-or-nothing: the first failing id aborts the whole call.
//!
//! ## Shared detectors
//!
//! Detector → spectrum lookups return a single spectrum. For a detector filed under several
//! spectra that is the first owner, so the detectors of a later owner map back to the
//! earlier one.
//!
//! ## Example
//!
//! ```rust
//! use specgeom::spectrum_index::{general::GeneralIndex, SpectrumDetectorIndex};
//!
//! let index: SpectrumDetectorIndex = GeneralIndex::from_pairs(&[1, 1, 2], &[10, 11, 20])?.into();
//! assert_eq!(index.spectrum_count(), 2);
//! assert_eq!(index.ndet(1)?, 2);
//! assert_eq!(index.spectra(&[20, 10])?, vec![2, 1]);
//! # Ok::<(), specgeom::specgeom_errors::SpecGeomError>(())
//! ```

pub mod cursor;
pub mod general;
pub mod range;

use crate::constants::{DetectorId, SpectrumNumber};
use crate::specgeom_errors::SpecGeomError;

use cursor::IndexCursor;
use general::{DetectorList, GeneralIndex};
use range::RangeIndex;

/// One (spectrum, detector) association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub spectrum: SpectrumNumber,
    pub detector: DetectorId,
}

impl IndexEntry {
    pub fn new(spectrum: SpectrumNumber, detector: DetectorId) -> Self {
        IndexEntry { spectrum, detector }
    }
}

impl From<(SpectrumNumber, DetectorId)> for IndexEntry {
    fn from((spectrum, detector): (SpectrumNumber, DetectorId)) -> Self {
        IndexEntry { spectrum, detector }
    }
}

/// Spectrum ↔ detector mapping, in one of its two representations.
#[derive(Debug, Clone)]
pub enum SpectrumDetectorIndex {
    General(GeneralIndex),
    Range(RangeIndex),
}

impl From<GeneralIndex> for SpectrumDetectorIndex {
    fn from(index: GeneralIndex) -> Self {
        SpectrumDetectorIndex::General(index)
    }
}

impl From<RangeIndex> for SpectrumDetectorIndex {
    fn from(index: RangeIndex) -> Self {
        SpectrumDetectorIndex::Range(index)
    }
}

impl SpectrumDetectorIndex {
    /// Contiguous one-to-one index over `[start, end]`.
    pub fn range(start: SpectrumNumber, end: SpectrumNumber) -> Result<Self, SpecGeomError> {
        RangeIndex::new(start, end).map(Self::Range)
    }

    /// General index built from parallel arrays.
    pub fn from_pairs(
        spectra: &[SpectrumNumber],
        detectors: &[DetectorId],
    ) -> Result<Self, SpecGeomError> {
        GeneralIndex::from_pairs(spectra, detectors).map(Self::General)
    }

    /// Number of detectors feeding `spectrum`.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::SpectrumNotFound`] (general) or [`SpecGeomError::OutOfRange`] (range).
    pub fn ndet(&self, spectrum: SpectrumNumber) -> Result<usize, SpecGeomError> {
        match self {
            Self::General(index) => index.ndet(spectrum),
            Self::Range(index) => index.ndet(spectrum),
        }
    }

    /// All detectors of one spectrum. The order is stable for a given index instance.
    pub fn detectors(&self, spectrum: SpectrumNumber) -> Result<DetectorList, SpecGeomError> {
        match self {
            Self::General(index) => index.detectors(spectrum).map(DetectorList::from_slice),
            Self::Range(index) => index
                .detector(spectrum)
                .map(|d| DetectorList::from_slice(&[d])),
        }
    }

    /// Spectrum of each detector, same length and order as `detectors`.
    ///
    /// Each id is resolved on its own; the call fails on the first id without a mapping and
    /// no partial result is returned.
    ///
    /// A detector filed under several spectra reports the one it was first filed under, so
    /// `spectra(detectors(s))` gives back `s` only when `s` owns its detectors alone or
    /// first. The full owner list is
    /// [`GeneralIndex::spectra_of`](crate::spectrum_index::general::GeneralIndex::spectra_of).
    pub fn spectra(&self, detectors: &[DetectorId]) -> Result<Vec<SpectrumNumber>, SpecGeomError> {
        detectors
            .iter()
            .map(|&detector| self.spectrum_of(detector))
            .collect()
    }

    /// Single-detector form of [`SpectrumDetectorIndex::spectra`].
    pub fn spectrum_of(&self, detector: DetectorId) -> Result<SpectrumNumber, SpecGeomError> {
        match self {
            Self::General(index) => index.spectrum_of(detector),
            Self::Range(index) => index.spectrum_of(detector),
        }
    }

    pub fn contains_spectrum(&self, spectrum: SpectrumNumber) -> bool {
        match self {
            Self::General(index) => index.contains_spectrum(spectrum),
            Self::Range(index) => index.contains_spectrum(spectrum),
        }
    }

    /// Total number of (spectrum, detector) entries.
    pub fn element_count(&self) -> usize {
        match self {
            Self::General(index) => index.element_count(),
            Self::Range(index) => index.element_count(),
        }
    }

    /// Number of distinct spectra.
    pub fn spectrum_count(&self) -> usize {
        match self {
            Self::General(index) => index.spectrum_count(),
            Self::Range(index) => index.spectrum_count(),
        }
    }

    pub fn is_one_to_one(&self) -> bool {
        match self {
            Self::General(index) => index.is_one_to_one(),
            Self::Range(_) => true,
        }
    }

    /// Fresh cursor over the representative entry of every spectrum, in insertion order
    /// (general) or ascending order (range).
    pub fn cursor(&self) -> IndexCursor<'_> {
        match self {
            Self::General(index) => IndexCursor::general(index),
            Self::Range(index) => IndexCursor::range(*index),
        }
    }

    /// Alias of [`SpectrumDetectorIndex::cursor`] for iterator chains.
    pub fn entries(&self) -> IndexCursor<'_> {
        self.cursor()
    }

    /// Mutable access to the general representation, for edits before publication.
    pub fn as_general_mut(&mut self) -> Option<&mut GeneralIndex> {
        match self {
            Self::General(index) => Some(index),
            Self::Range(_) => None,
        }
    }

    /// Materialise the mapping as a general index so it can be edited.
    pub fn to_general(&self) -> GeneralIndex {
        match self {
            Self::General(index) => index.clone(),
            Self::Range(index) => {
                let mut general = GeneralIndex::new();
                for value in index.start()..=index.end() {
                    general.add_entries(value, &[value]);
                }
                general
            }
        }
    }
}

#[cfg(test)]
mod spectrum_index_test {
    use super::*;
    use crate::specgeom_errors::ErrorKind;
    use itertools::Itertools;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_index_is_shareable() {
        assert_send_sync::<SpectrumDetectorIndex>();
    }

    #[test]
    fn test_range_variant_contract() {
        let index = SpectrumDetectorIndex::range(0, 4).unwrap();
        assert_eq!(index.element_count(), 5);
        assert_eq!(index.ndet(2), Ok(1));
        assert_eq!(index.detectors(2).unwrap().as_slice(), &[2]);
        assert_eq!(index.spectra(&[5]).unwrap_err().kind(), ErrorKind::OutOfRange);

        let entries = index
            .cursor()
            .map(|e| (e.spectrum, e.detector))
            .collect_vec();
        assert_eq!(entries, vec![(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)]);

        let mut cursor = index.cursor();
        for _ in 0..5 {
            cursor.advance();
        }
        assert!(cursor.at_end());
    }

    #[test]
    fn test_general_variant_contract() {
        let index = SpectrumDetectorIndex::from_pairs(&[1, 1, 2], &[10, 11, 20]).unwrap();
        assert_eq!(index.spectrum_count(), 2);
        assert_eq!(index.ndet(1), Ok(2));
        assert_eq!(
            index.detectors(1).unwrap().into_iter().sorted().collect_vec(),
            vec![10, 11]
        );
        assert_eq!(index.ndet(2), Ok(1));
        assert_eq!(index.ndet(3).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_remap_through_published_type() {
        let mut index = SpectrumDetectorIndex::from_pairs(&[1, 1, 2], &[10, 11, 20]).unwrap();
        index.as_general_mut().unwrap().remap(1, 2).unwrap();
        assert_eq!(index.ndet(2), Ok(3));
        assert_eq!(index.ndet(1).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(index.element_count(), 3);
    }

    #[test]
    fn test_batch_lookup_is_all_or_nothing() {
        let index = SpectrumDetectorIndex::from_pairs(&[1, 2, 3], &[10, 20, 30]).unwrap();
        assert_eq!(index.spectra(&[30, 10]), Ok(vec![3, 1]));
        assert_eq!(
            index.spectra(&[10, 99, 20]),
            Err(SpecGeomError::UnmappedDetector(99))
        );
        assert_eq!(index.spectra(&[]), Ok(vec![]));
    }

    #[test]
    fn test_round_trip_detectors_to_spectra() {
        let index =
            SpectrumDetectorIndex::from_pairs(&[4, 4, 7, 8, 8, 8], &[1, 2, 3, 4, 5, 6]).unwrap();
        for entry in index.entries() {
            let detectors = index.detectors(entry.spectrum).unwrap();
            let spectra = index.spectra(&detectors).unwrap();
            assert!(spectra.contains(&entry.spectrum));
        }
    }

    #[test]
    fn test_range_to_general() {
        let index = SpectrumDetectorIndex::range(10, 12).unwrap();
        assert!(matches!(index, SpectrumDetectorIndex::Range(_)));
        let mut general = index.to_general();
        assert_eq!(general.element_count(), 3);
        general.remap(10, 11).unwrap();
        let edited = SpectrumDetectorIndex::from(general);
        assert_eq!(edited.ndet(11), Ok(2));
        assert!(!edited.is_one_to_one());
        assert!(index.is_one_to_one());
    }
}
