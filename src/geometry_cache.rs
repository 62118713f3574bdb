//! # Geometry cache
//!
//! Memoizes resolved absolute **positions**, **rotations** and **bounding boxes** per
//! component, and owns the lazily built [`SpatialNeighbourGraph`].
//!
//! ## Structure
//!
//! ```text
//! GeometryCache
//! ├── positions       RwLock<ComponentId → V3D>
//! ├── rotations       RwLock<ComponentId → Quat>
//! ├── bounding_boxes  RwLock<ComponentId → BoundingBox>
//! ├── graph           RwLock<OnceCell<Arc<SpatialNeighbourGraph>>>
//! ├── index           RwLock<Weak<SpectrumDetectorIndex>>   (observer, never owner)
//! ├── build_pool      OnceCell<rayon::ThreadPool>           (created on first graph build)
//! └── resolver        Arc<dyn GeometryResolver>
//! ```
//!
//! A missing entry means *not resolved yet*, never *resolved to nothing*: callers fall back
//! to the geometry collaborator and store the answer (or use the `*_or_resolve` helpers
//! which do exactly that).
//!
//! ## Concurrency
//!
//! - Each table has its own lock; reads of one table never contend with writes of another.
//!   Population is cheap next to the numeric work around it, so a coarse lock per table is
//!   enough.
//! - The neighbour graph is built at most once per invalidation epoch. Concurrent first
//!   queries block on the same [`OnceCell`] initialisation instead of each building a graph.
//! - The parallel part of a graph build runs on a rayon pool owned by the cache, never on
//!   the global pool whose workers may be among those blocked on the cell. A build started
//!   from a rayon worker thread runs sequentially on that thread.
//! - [`GeometryCache::invalidate_all`] takes every write lock and is therefore exclusive
//!   with respect to all reads and writes.
//!
//! ## Keeping the cache honest
//!
//! There is no notification channel between the geometry, the active index and this cache.
//! Whoever moves a component or installs a new index **must** call
//! [`GeometryCache::invalidate_all`] afterwards; until then cached values and the neighbour
//! graph keep describing the previous state. [`DetectorWorkspace`](crate::workspace::DetectorWorkspace)
//! does this for index replacement.
//!
//! ## Logging
//!
//! The cache emits its `tracing` events under the span handed to [`GeometryCache::new`];
//! pass `Span::none()` to silence it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::RandomState;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn, Span};

use crate::constants::{NeighbourMap, Quat, SpectrumNumber, V3D};
use crate::geometry::{BoundingBox, ComponentId, GeometryResolver};
use crate::neighbours::params::NeighbourParams;
use crate::neighbours::SpatialNeighbourGraph;
use crate::specgeom_errors::SpecGeomError;
use crate::spectrum_index::SpectrumDetectorIndex;

/// One memo table guarded by its own lock.
#[derive(Debug)]
struct CacheTable<V> {
    entries: RwLock<HashMap<ComponentId, V, RandomState>>,
}

impl<V: Copy> CacheTable<V> {
    fn new() -> Self {
        CacheTable {
            entries: RwLock::new(HashMap::default()),
        }
    }

    fn get(&self, key: &ComponentId) -> Option<V> {
        self.entries.read().get(key).copied()
    }

    fn set(&self, key: ComponentId, value: V) {
        self.entries.write().insert(key, value);
    }

    /// Cached value, or resolve, store and return it. Concurrent resolutions of the same
    /// key may both run; the first stored value wins and is returned to both.
    fn get_or_resolve(&self, key: ComponentId, resolve: impl FnOnce() -> Option<V>) -> Option<V> {
        if let Some(v) = self.get(&key) {
            return Some(v);
        }
        let resolved = resolve()?;
        Some(*self.entries.write().entry(key).or_insert(resolved))
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

pub struct GeometryCache {
    resolver: Arc<dyn GeometryResolver>,
    params: NeighbourParams,
    positions: CacheTable<V3D>,
    rotations: CacheTable<Quat>,
    bounding_boxes: CacheTable<BoundingBox>,
    index: RwLock<Weak<SpectrumDetectorIndex>>,
    graph: RwLock<OnceCell<Arc<SpatialNeighbourGraph>>>,
    epoch: AtomicU64,
    graph_builds: AtomicU64,
    build_pool: OnceCell<Option<ThreadPool>>,
    span: Span,
}

impl std::fmt::Debug for GeometryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryCache")
            .field("params", &self.params)
            .field("positions", &self.positions.len())
            .field("rotations", &self.rotations.len())
            .field("bounding_boxes", &self.bounding_boxes.len())
            .field("has_graph", &self.has_graph())
            .field("epoch", &self.epoch())
            .finish()
    }
}

impl GeometryCache {
    /// Create an empty cache over a geometry collaborator.
    ///
    /// Arguments
    /// -----------------
    /// * `resolver`: Geometry collaborator used on cache misses and for graph builds.
    /// * `params`: Neighbour graph configuration.
    /// * `span`: Logging capability; events are emitted as children of this span.
    ///
    /// No index is associated yet: neighbour queries fail until
    /// [`GeometryCache::set_index`] is called.
    pub fn new(resolver: Arc<dyn GeometryResolver>, params: NeighbourParams, span: Span) -> Self {
        GeometryCache {
            resolver,
            params,
            positions: CacheTable::new(),
            rotations: CacheTable::new(),
            bounding_boxes: CacheTable::new(),
            index: RwLock::new(Weak::new()),
            graph: RwLock::new(OnceCell::new()),
            epoch: AtomicU64::new(0),
            graph_builds: AtomicU64::new(0),
            build_pool: OnceCell::new(),
            span,
        }
    }

    pub fn params(&self) -> &NeighbourParams {
        &self.params
    }

    pub fn resolver(&self) -> &Arc<dyn GeometryResolver> {
        &self.resolver
    }

    // ---------------------------------------------------------------------------------------------
    // Memo tables
    // ---------------------------------------------------------------------------------------------

    pub fn position(&self, component: ComponentId) -> Option<V3D> {
        self.positions.get(&component)
    }

    pub fn set_position(&self, component: ComponentId, position: V3D) {
        self.positions.set(component, position);
    }

    pub fn rotation(&self, component: ComponentId) -> Option<Quat> {
        self.rotations.get(&component)
    }

    pub fn set_rotation(&self, component: ComponentId, rotation: Quat) {
        self.rotations.set(component, rotation);
    }

    pub fn bounding_box(&self, component: ComponentId) -> Option<BoundingBox> {
        self.bounding_boxes.get(&component)
    }

    pub fn set_bounding_box(&self, component: ComponentId, bbox: BoundingBox) {
        self.bounding_boxes.set(component, bbox);
    }

    /// Cached position, resolving and storing it on a miss.
    ///
    /// Returns `None` only when the collaborator cannot resolve the component either; in
    /// that case nothing is stored.
    pub fn position_or_resolve(&self, component: ComponentId) -> Option<V3D> {
        self.positions.get_or_resolve(component, || {
            self.resolver.resolve_component_position(component)
        })
    }

    pub fn rotation_or_resolve(&self, component: ComponentId) -> Option<Quat> {
        self.rotations
            .get_or_resolve(component, || self.resolver.resolve_rotation(component))
    }

    pub fn bounding_box_or_resolve(&self, component: ComponentId) -> Option<BoundingBox> {
        self.bounding_boxes
            .get_or_resolve(component, || self.resolver.resolve_bounding_box(component))
    }

    /// Number of cached positions, rotations and bounding boxes.
    pub fn len(&self) -> (usize, usize, usize) {
        (
            self.positions.len(),
            self.rotations.len(),
            self.bounding_boxes.len(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.len() == (0, 0, 0) && !self.has_graph()
    }

    // ---------------------------------------------------------------------------------------------
    // Invalidation
    // ---------------------------------------------------------------------------------------------

    /// Drop every cached value and the neighbour graph, opening a new epoch.
    ///
    /// Must be called after any geometry change and after the active index is replaced.
    /// Waits for in-flight reads to finish and blocks new ones while clearing.
    pub fn invalidate_all(&self) {
        let mut positions = self.positions.entries.write();
        let mut rotations = self.rotations.entries.write();
        let mut bounding_boxes = self.bounding_boxes.entries.write();
        let mut graph = self.graph.write();

        positions.clear();
        rotations.clear();
        bounding_boxes.clear();
        let had_graph = graph.take().is_some();

        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(parent: &self.span, epoch, had_graph, "geometry cache invalidated");
    }

    /// Number of completed invalidations.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    // ---------------------------------------------------------------------------------------------
    // Index back-reference and neighbour graph
    // ---------------------------------------------------------------------------------------------

    /// Associate the index used for neighbour graph builds.
    ///
    /// Only a weak reference is kept; the workspace stays the sole owner. This does **not**
    /// invalidate anything: call [`GeometryCache::invalidate_all`] when the index changes.
    pub fn set_index(&self, index: &Arc<SpectrumDetectorIndex>) {
        *self.index.write() = Arc::downgrade(index);
    }

    /// Forget the associated index.
    pub fn clear_index(&self) {
        *self.index.write() = Weak::new();
    }

    /// The associated index, if one is set and still alive.
    pub fn active_index(&self) -> Result<Arc<SpectrumDetectorIndex>, SpecGeomError> {
        self.index.read().upgrade().ok_or_else(|| {
            SpecGeomError::PrecompiledGeometryMissing(
                "no spectrum-detector index is associated with the geometry cache".into(),
            )
        })
    }

    pub fn has_graph(&self) -> bool {
        self.graph.read().get().is_some()
    }

    /// Number of neighbour graphs built since creation.
    pub fn graph_builds(&self) -> u64 {
        self.graph_builds.load(Ordering::Acquire)
    }

    /// The neighbour graph of the current epoch, built on first use.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::PrecompiledGeometryMissing`] if no index is associated or no
    ///   position resolves.
    /// * [`SpecGeomError::InvalidArgument`] if the configured `k` does not fit the instrument.
    pub fn neighbour_graph(&self) -> Result<Arc<SpatialNeighbourGraph>, SpecGeomError> {
        let cell = self.graph.read();
        let graph = cell.get_or_try_init(|| {
            let index = self.active_index()?;
            let graph = self.build_graph(&index)?;
            self.graph_builds.fetch_add(1, Ordering::AcqRel);
            Ok::<_, SpecGeomError>(Arc::new(graph))
        })?;
        Ok(Arc::clone(graph))
    }

    /// Runs inside the graph cell initialisation, so the parallel searches never go to a
    /// pool whose workers may be blocked on that cell: they use the cache's own pool, and a
    /// caller that is itself a rayon worker builds on its own thread.
    fn build_graph(
        &self,
        index: &SpectrumDetectorIndex,
    ) -> Result<SpatialNeighbourGraph, SpecGeomError> {
        let resolver = self.resolver.as_ref();
        if rayon::current_thread_index().is_none() {
            if let Some(pool) = self.build_pool() {
                return pool.install(|| {
                    let _entered = self.span.enter();
                    SpatialNeighbourGraph::build(index, resolver, &self.params)
                });
            }
        }
        let _entered = self.span.enter();
        SpatialNeighbourGraph::build_sequential(index, resolver, &self.params)
    }

    fn build_pool(&self) -> Option<&ThreadPool> {
        self.build_pool
            .get_or_init(|| {
                ThreadPoolBuilder::new()
                    .thread_name(|i| format!("specgeom-neighbours-{i}"))
                    .build()
                    .map_err(|err| {
                        let _entered = self.span.enter();
                        warn!(%err, "no neighbour build pool, graphs are built sequentially");
                    })
                    .ok()
            })
            .as_ref()
    }

    /// Spectra near the detector carried by `component`.
    ///
    /// Arguments
    /// -----------------
    /// * `component`: A detector component.
    /// * `radius`: Physical radius filter; `0` returns all `k` neighbours.
    ///
    /// Return
    /// ----------
    /// * Neighbouring spectrum → physical distance.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::PrecompiledGeometryMissing`] if no index is associated.
    /// * [`SpecGeomError::InvalidArgument`] if `component` is not a detector, or its
    ///   detector is not mapped by the active index.
    /// * [`SpecGeomError::SpectrumNotFound`] if its spectrum is not a graph vertex.
    ///
    /// See also
    /// ------------
    /// * [`SpatialNeighbourGraph::neighbours`] – Selection rules, including the radius
    ///   approximation.
    pub fn neighbours(
        &self,
        component: ComponentId,
        radius: f64,
    ) -> Result<NeighbourMap, SpecGeomError> {
        let index = self.active_index()?;
        let detector = self.resolver.detector_id(component).ok_or_else(|| {
            SpecGeomError::InvalidArgument(format!(
                "component {} is not a detector",
                component.raw()
            ))
        })?;
        let spectrum = index.spectrum_of(detector)?;
        self.neighbour_graph()?.neighbours(spectrum, radius)
    }

    /// Spectra near `spectrum`, with the configured default radius.
    pub fn neighbours_of_spectrum(
        &self,
        spectrum: SpectrumNumber,
    ) -> Result<NeighbourMap, SpecGeomError> {
        self.neighbour_graph()?
            .neighbours(spectrum, self.params.default_radius)
    }
}
