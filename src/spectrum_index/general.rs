//! General (many-to-many) spectrum ↔ detector mapping.
//!
//! Storage is a hash multimap from spectrum to its detector bucket, kept alongside the
//! insertion order of spectra (for deterministic cursors) and a reverse table used by
//! batch detector lookups. A detector may legitimately appear under several spectra:
//! historical data files contain such mappings and they must load unchanged.

use ahash::RandomState;
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::constants::{DetectorId, SpectrumNumber};
use crate::specgeom_errors::SpecGeomError;

use super::IndexEntry;

/// Detectors contributing to one spectrum. Most spectra hold a single pixel.
pub type DetectorList = SmallVec<[DetectorId; 4]>;

type SpectrumList = SmallVec<[SpectrumNumber; 1]>;

/// Associative spectrum ↔ detector index.
///
/// # Publication contract
///
/// `populate`, `add_entries` and `remap` take `&mut self`. They may only run while the
/// index is private to the thread building it. Once the index is shared (typically as an
/// `Arc<SpectrumDetectorIndex>` installed in a workspace) it is frozen: the borrow checker
/// refuses `&mut` access through a shared `Arc`, and the owner replaces the whole index
/// instead of editing it.
#[derive(Debug, Clone, Default)]
pub struct GeneralIndex {
    buckets: HashMap<SpectrumNumber, DetectorList, RandomState>,
    order: Vec<SpectrumNumber>,
    reverse: HashMap<DetectorId, SpectrumList, RandomState>,
    n_elements: usize,
}

impl GeneralIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from two parallel arrays (see [`GeneralIndex::populate`]).
    pub fn from_pairs(
        spectra: &[SpectrumNumber],
        detectors: &[DetectorId],
    ) -> Result<Self, SpecGeomError> {
        let mut index = Self::new();
        index.populate(spectra, detectors)?;
        Ok(index)
    }

    /// Replace the whole content with the pairs `(spectra[i], detectors[i])`.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::InvalidArgument`] if the two slices differ in length. The index is
    ///   left untouched in that case.
    pub fn populate(
        &mut self,
        spectra: &[SpectrumNumber],
        detectors: &[DetectorId],
    ) -> Result<(), SpecGeomError> {
        if spectra.len() != detectors.len() {
            return Err(SpecGeomError::InvalidArgument(format!(
                "populate expects parallel arrays, got {} spectra and {} detectors",
                spectra.len(),
                detectors.len()
            )));
        }
        self.clear();
        for (&spectrum, &detector) in spectra.iter().zip(detectors) {
            self.insert(spectrum, detector);
        }
        Ok(())
    }

    /// Append detectors to a spectrum, creating it if needed.
    ///
    /// Repeated calls for the same spectrum accumulate. An empty `detectors` slice does not
    /// create the spectrum.
    pub fn add_entries(&mut self, spectrum: SpectrumNumber, detectors: &[DetectorId]) {
        for &detector in detectors {
            self.insert(spectrum, detector);
        }
    }

    /// Move every detector of `old` under `new`, merging with `new`'s existing bucket.
    ///
    /// If `new` did not exist it takes `old`'s place in the cursor order; otherwise `old`
    /// simply disappears from it. The element count is unchanged. For a shared detector,
    /// `new` takes `old`'s place among its owners, so a detector first filed under `old`
    /// reports `new` from [`GeneralIndex::spectrum_of`].
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::SpectrumNotFound`] if `old` is absent; nothing is modified.
    pub fn remap(&mut self, old: SpectrumNumber, new: SpectrumNumber) -> Result<(), SpecGeomError> {
        if !self.buckets.contains_key(&old) {
            return Err(SpecGeomError::SpectrumNotFound(old));
        }
        if old == new {
            return Ok(());
        }
        let moved = self.buckets.remove(&old).unwrap_or_default();

        // `new` inherits `old`'s rank among the owners; a duplicate keeps the earlier rank
        for detector in &moved {
            if let Some(owners) = self.reverse.get_mut(detector) {
                rename_owner(owners, old, new);
            }
        }

        match self.buckets.get_mut(&new) {
            Some(target) => {
                target.extend(moved);
                self.order.retain(|s| *s != old);
            }
            None => {
                self.buckets.insert(new, moved);
                if let Some(slot) = self.order.iter_mut().find(|s| **s == old) {
                    *slot = new;
                }
            }
        }
        Ok(())
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.order.clear();
        self.reverse.clear();
        self.n_elements = 0;
    }

    fn insert(&mut self, spectrum: SpectrumNumber, detector: DetectorId) {
        let bucket = self.buckets.entry(spectrum).or_insert_with(|| {
            self.order.push(spectrum);
            DetectorList::new()
        });
        bucket.push(detector);

        let owners = self.reverse.entry(detector).or_default();
        if !owners.contains(&spectrum) {
            owners.push(spectrum);
        }
        self.n_elements += 1;
    }

    pub fn ndet(&self, spectrum: SpectrumNumber) -> Result<usize, SpecGeomError> {
        self.detectors(spectrum).map(<[DetectorId]>::len)
    }

    /// Detectors of one spectrum, in insertion order.
    pub fn detectors(&self, spectrum: SpectrumNumber) -> Result<&[DetectorId], SpecGeomError> {
        self.buckets
            .get(&spectrum)
            .map(|b| b.as_slice())
            .ok_or(SpecGeomError::SpectrumNotFound(spectrum))
    }

    /// Spectrum owning `detector`. When several spectra share the detector the one it was
    /// first filed under is returned.
    pub fn spectrum_of(&self, detector: DetectorId) -> Result<SpectrumNumber, SpecGeomError> {
        self.reverse
            .get(&detector)
            .and_then(|owners| owners.first().copied())
            .ok_or(SpecGeomError::UnmappedDetector(detector))
    }

    /// Every spectrum a detector is filed under.
    pub fn spectra_of(&self, detector: DetectorId) -> &[SpectrumNumber] {
        self.reverse
            .get(&detector)
            .map(|owners| owners.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_spectrum(&self, spectrum: SpectrumNumber) -> bool {
        self.buckets.contains_key(&spectrum)
    }

    pub fn element_count(&self) -> usize {
        self.n_elements
    }

    pub fn spectrum_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_one_to_one(&self) -> bool {
        self.n_elements == self.order.len() && self.reverse.len() == self.n_elements
    }

    /// Representative entry at cursor position `position`, `None` past the end.
    pub(crate) fn representative(&self, position: usize) -> Option<IndexEntry> {
        let spectrum = *self.order.get(position)?;
        let detector = *self.buckets.get(&spectrum)?.first()?;
        Some(IndexEntry { spectrum, detector })
    }
}

/// Replace `old` by `new` in place, then drop every occurrence of `new` after the first.
fn rename_owner(owners: &mut SpectrumList, old: SpectrumNumber, new: SpectrumNumber) {
    let Some(at) = owners.iter().position(|s| *s == old) else {
        return;
    };
    owners[at] = new;
    let mut seen = false;
    owners.retain(|s| {
        if *s != new {
            return true;
        }
        !std::mem::replace(&mut seen, true)
    });
}
