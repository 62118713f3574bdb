//! # Detector workspace
//!
//! Thin owner of the active [`SpectrumDetectorIndex`] and of the [`GeometryCache`] built
//! over the instrument. It is the only party allowed to replace the index, and it keeps the
//! cache in step when it does so.
//!
//! It also derives the per-workspace lookup tables numeric algorithms use to go from a
//! spectrum or a detector to a storage row ("workspace index"): row `i` holds the `i`-th
//! spectrum produced by the index cursor.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use specgeom::constants::{Quat, V3D};
//! use specgeom::geometry::ComponentArena;
//! use specgeom::neighbours::params::NeighbourParams;
//! use specgeom::spectrum_index::SpectrumDetectorIndex;
//! use specgeom::workspace::DetectorWorkspace;
//! use tracing::Span;
//!
//! let mut arena = ComponentArena::new();
//! let bank = arena.add_component("bank", V3D::zeros(), Quat::identity());
//! for d in 0..4 {
//!     arena.add_detector(Some(bank), d, Some(V3D::new(d as f64, 0.0, 0.0)), None)?;
//! }
//! let params = NeighbourParams::builder().neighbour_count(1).build()?;
//! let ws = DetectorWorkspace::new(
//!     SpectrumDetectorIndex::range(0, 3)?,
//!     Arc::new(arena),
//!     params,
//!     Span::none(),
//! );
//! assert_eq!(ws.spectrum_to_workspace_index()[&2], 2);
//!
//! // Regroup pixels pairwise: the cache is invalidated by the installation.
//! ws.install_index(SpectrumDetectorIndex::from_pairs(&[10, 10, 11, 11], &[0, 1, 2, 3])?);
//! assert_eq!(ws.index().spectrum_count(), 2);
//! # Ok::<(), specgeom::specgeom_errors::SpecGeomError>(())
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::RwLock;
use tracing::{debug, Span};

use crate::constants::{DetectorId, NeighbourMap, SpectrumNumber};
use crate::geometry::{ComponentId, GeometryResolver};
use crate::geometry_cache::GeometryCache;
use crate::neighbours::params::NeighbourParams;
use crate::specgeom_errors::SpecGeomError;
use crate::spectrum_index::SpectrumDetectorIndex;

/// Owner of the active index and of the geometry cache.
#[derive(Debug)]
pub struct DetectorWorkspace {
    index: RwLock<Arc<SpectrumDetectorIndex>>,
    cache: GeometryCache,
    span: Span,
}

impl DetectorWorkspace {
    /// Publish `index` and create the geometry cache associated with it.
    ///
    /// Arguments
    /// -----------------
    /// * `index`: Fully built index; it is frozen from here on.
    /// * `resolver`: Instrument geometry collaborator.
    /// * `params`: Neighbour graph configuration for the cache.
    /// * `span`: Logging capability shared by the workspace and its cache.
    pub fn new(
        index: SpectrumDetectorIndex,
        resolver: Arc<dyn GeometryResolver>,
        params: NeighbourParams,
        span: Span,
    ) -> Self {
        let index = Arc::new(index);
        let cache = GeometryCache::new(resolver, params, span.clone());
        cache.set_index(&index);
        DetectorWorkspace {
            index: RwLock::new(index),
            cache,
            span,
        }
    }

    /// Snapshot of the active index. It stays valid even if another index is installed
    /// while the caller still holds it.
    pub fn index(&self) -> Arc<SpectrumDetectorIndex> {
        Arc::clone(&self.index.read())
    }

    pub fn cache(&self) -> &GeometryCache {
        &self.cache
    }

    /// Replace the active index wholesale.
    ///
    /// The swap is atomic for readers of [`DetectorWorkspace::index`]. The cache is pointed
    /// at the new index and invalidated, so the next neighbour query rebuilds the graph.
    pub fn install_index(&self, index: SpectrumDetectorIndex) {
        let index = Arc::new(index);
        {
            let mut active = self.index.write();
            *active = Arc::clone(&index);
        }
        self.cache.set_index(&index);
        self.cache.invalidate_all();
        debug!(
            parent: &self.span,
            spectra = index.spectrum_count(),
            elements = index.element_count(),
            "spectrum-detector index installed"
        );
    }

    /// Notify the workspace that instrument geometry changed (a component moved, a
    /// parameter was edited). Drops every cached geometric quantity.
    pub fn geometry_changed(&self) {
        self.cache.invalidate_all();
    }

    /// Spectra near the detector held by `component`.
    pub fn neighbours(
        &self,
        component: ComponentId,
        radius: f64,
    ) -> Result<NeighbourMap, SpecGeomError> {
        self.cache.neighbours(component, radius)
    }

    /// Spectrum number → workspace index, following the index cursor order.
    pub fn spectrum_to_workspace_index(&self) -> HashMap<SpectrumNumber, usize, RandomState> {
        self.index()
            .entries()
            .enumerate()
            .map(|(row, entry)| (entry.spectrum, row))
            .collect()
    }

    /// Detector id → workspace index of the spectrum it feeds.
    ///
    /// A detector filed under several spectra maps to the row of the spectrum the index
    /// reports for it in [`SpectrumDetectorIndex::spectra`].
    pub fn detector_to_workspace_index(
        &self,
    ) -> Result<HashMap<DetectorId, usize, RandomState>, SpecGeomError> {
        let index = self.index();
        let rows = self.spectrum_to_workspace_index();

        let mut detectors: Vec<DetectorId> = Vec::with_capacity(index.element_count());
        for entry in index.entries() {
            detectors.extend(index.detectors(entry.spectrum)?);
        }
        let spectra = index.spectra(&detectors)?;

        detectors
            .into_iter()
            .zip(spectra)
            .map(|(detector, spectrum)| {
                rows.get(&spectrum)
                    .map(|&row| (detector, row))
                    .ok_or(SpecGeomError::SpectrumNotFound(spectrum))
            })
            .collect()
    }
}
