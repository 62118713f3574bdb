//! # Spatial neighbour graph
//!
//! Precomputed k-nearest-neighbour graph over spectra, used by masking and aggregation
//! algorithms that need "the spectra around this one".
//!
//! ## Construction
//!
//! For every spectrum of an index snapshot the detector positions are asked from the
//! geometry collaborator ([`GeometryResolver`](crate::geometry::GeometryResolver)). Spectra
//! with at least one resolvable position become vertices; the others are skipped.
//! Every vertex position is multiplied component-wise by the configured
//! [`ScaleVector`](crate::neighbours::params::ScaleVector), bulk loaded into an
//! [rstar](https://docs.rs/rstar) R-tree, and each vertex then keeps the `k` closest other
//! vertices in that scaled space. Equidistant candidates are ranked by vertex order.
//! Per-vertex searches run on the caller's rayon pool, or on the calling thread with
//! [`SpatialNeighbourGraph::build_sequential`].
//!
//! ```text
//! index cursor ─► detectors(s) ─► resolve_position(d) ─► centroid ─► scale ─► R-tree
//!                                                                         │
//!           per vertex: nearest k plus ties, drop self, keep k ◄──────────┘
//! ```
//!
//! Edges store the **unscaled** physical distance between the two vertex positions, so the
//! scale only decides *who* is a neighbour, never the distance reported.
//!
//! ## Radius queries are approximate
//!
//! [`SpatialNeighbourGraph::neighbours`] with `radius > 0` filters the `k` precomputed
//! neighbours by physical distance. It is not a range search: spectra inside the radius
//! but beyond the k-th neighbour are not reported. Query cost stays O(k) whatever the
//! radius; callers needing wider neighbourhoods must build the graph with a larger `k`.
//!
//! ## Complexity
//!
//! - Build: O(n log n) for the tree, O(n · k log n) for the searches (plus the size of any
//!   tie set at the k-th distance).
//! - Query: O(k).

pub mod params;

use std::collections::HashMap;
use std::time::Instant;

use ahash::RandomState;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::constants::{DetectorId, Distance, NeighbourMap, SpectrumNumber, V3D};
use crate::geometry::GeometryResolver;
use crate::specgeom_errors::SpecGeomError;
use crate::spectrum_index::SpectrumDetectorIndex;

use params::{NeighbourParams, ScaleVector};

#[derive(Debug, Clone, Copy)]
struct Vertex {
    spectrum: SpectrumNumber,
    position: V3D,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    target: usize,
    distance: Distance,
}

type EdgeList = SmallVec<[Edge; 8]>;

/// Scaled vertex position tagged with its vertex index.
type IndexedPoint = GeomWithData<[f64; 3], usize>;

/// How the per-vertex searches of a build are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schedule {
    /// On the rayon pool the caller is running in (the global pool by default).
    Parallel,
    /// On the calling thread only.
    Sequential,
}

/// Candidates for the `k` nearest neighbours of vertex `own`, as (squared scaled
/// distance, vertex) pairs.
///
/// The tree is walked in order of increasing distance until `k` other vertices are
/// collected, then further while candidates tie with the last one kept, so that sorting
/// the result settles ties by vertex order rather than by tree layout.
fn nearest_with_ties(
    tree: &RTree<IndexedPoint>,
    point: &[f64; 3],
    own: usize,
    k: usize,
) -> Vec<(OrderedFloat<f64>, usize)> {
    let mut hits: Vec<(OrderedFloat<f64>, usize)> = Vec::with_capacity(k + 1);
    for (hit, d2) in tree.nearest_neighbor_iter_with_distance_2(point) {
        let d2 = OrderedFloat(d2);
        if hits.len() >= k && hits.last().is_some_and(|&(last, _)| d2 > last) {
            break;
        }
        if hit.data != own {
            hits.push((d2, hit.data));
        }
    }
    hits
}

/// k-nearest-neighbour graph keyed by spectrum number.
#[derive(Debug, Clone)]
pub struct SpatialNeighbourGraph {
    vertices: Vec<Vertex>,
    lookup: HashMap<SpectrumNumber, usize, RandomState>,
    edges: Vec<EdgeList>,
    scale: ScaleVector,
    k: usize,
}

/// Centroid of the resolvable detector positions of one spectrum.
fn representative_position<R>(
    detectors: &[DetectorId],
    resolver: &R,
    exclude_monitors: bool,
) -> Option<V3D>
where
    R: GeometryResolver + ?Sized,
{
    let (sum, count) = detectors
        .iter()
        .filter(|&&d| !(exclude_monitors && resolver.is_monitor(d)))
        .filter_map(|&d| resolver.resolve_position(d))
        .fold((V3D::zeros(), 0usize), |(sum, n), p| (sum + p, n + 1));
    (count > 0).then(|| sum / count as f64)
}

impl SpatialNeighbourGraph {
    /// Build the graph from an index snapshot.
    ///
    /// A spectrum fed by several detectors is represented by the **centroid** of its
    /// resolvable detector positions (monitors excluded when
    /// [`NeighbourParams::exclude_monitors`] is set). Candidates at the same scaled distance
    /// are ranked by cursor order, including for the k-th slot, so the graph does not depend
    /// on the tree layout. Coincident positions are valid neighbours at distance 0.
    ///
    /// The per-vertex searches run on the rayon pool the caller is in.
    ///
    /// Arguments
    /// -----------------
    /// * `index`: Spectrum ↔ detector mapping to take vertices from.
    /// * `resolver`: Geometry collaborator resolving detector positions.
    /// * `params`: Neighbour count `k`, scale vector and monitor policy.
    ///
    /// Return
    /// ----------
    /// * The populated graph.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::PrecompiledGeometryMissing`] if no spectrum resolves to a position.
    /// * [`SpecGeomError::InvalidArgument`] if `k == 0` or `k >= vertex count`.
    ///
    /// See also
    /// ------------
    /// * [`SpatialNeighbourGraph::build_sequential`] – Same graph without the rayon pool.
    /// * [`SpatialNeighbourGraph::neighbours`] – Query side of the graph.
    /// * [`GeometryCache::neighbours`](crate::geometry_cache::GeometryCache::neighbours) – Lazy, cached build.
    pub fn build<R>(
        index: &SpectrumDetectorIndex,
        resolver: &R,
        params: &NeighbourParams,
    ) -> Result<Self, SpecGeomError>
    where
        R: GeometryResolver + ?Sized,
    {
        Self::build_with(index, resolver, params, Schedule::Parallel)
    }

    /// Build the graph on the calling thread only.
    ///
    /// Produces the same graph as [`SpatialNeighbourGraph::build`]. Meant for callers that
    /// hold a lock or a lazy cell other pool workers may wait on.
    pub fn build_sequential<R>(
        index: &SpectrumDetectorIndex,
        resolver: &R,
        params: &NeighbourParams,
    ) -> Result<Self, SpecGeomError>
    where
        R: GeometryResolver + ?Sized,
    {
        Self::build_with(index, resolver, params, Schedule::Sequential)
    }

    fn build_with<R>(
        index: &SpectrumDetectorIndex,
        resolver: &R,
        params: &NeighbourParams,
        schedule: Schedule,
    ) -> Result<Self, SpecGeomError>
    where
        R: GeometryResolver + ?Sized,
    {
        let k = params.neighbour_count;
        if k == 0 {
            return Err(SpecGeomError::InvalidArgument(
                "neighbour count k must be > 0".into(),
            ));
        }
        let started = Instant::now();

        let mut vertices = Vec::with_capacity(index.spectrum_count());
        let mut skipped = 0usize;
        for entry in index.entries() {
            let detectors = index.detectors(entry.spectrum)?;
            match representative_position(&detectors, resolver, params.exclude_monitors) {
                Some(position) => vertices.push(Vertex {
                    spectrum: entry.spectrum,
                    position,
                }),
                None => {
                    skipped += 1;
                    trace!(spectrum = entry.spectrum, "no resolvable detector position");
                }
            }
        }

        if vertices.is_empty() {
            return Err(SpecGeomError::PrecompiledGeometryMissing(format!(
                "none of the {} spectra resolves to a detector position",
                index.spectrum_count()
            )));
        }
        if k >= vertices.len() {
            return Err(SpecGeomError::InvalidArgument(format!(
                "neighbour count k={k} must be smaller than the vertex count {}",
                vertices.len()
            )));
        }

        let scale = params.scale;
        let scaled: Vec<[f64; 3]> = vertices
            .iter()
            .map(|v| {
                let p = scale.apply(&v.position);
                [p.x, p.y, p.z]
            })
            .collect();

        let tree = RTree::bulk_load(
            scaled
                .iter()
                .enumerate()
                .map(|(i, point)| IndexedPoint::new(*point, i))
                .collect(),
        );

        let search = |(i, point): (usize, &[f64; 3])| {
            let mut hits = nearest_with_ties(&tree, point, i, k);
            hits.sort_unstable();
            hits.into_iter()
                .take(k)
                .map(|(_, j)| Edge {
                    target: j,
                    distance: (vertices[j].position - vertices[i].position).norm(),
                })
                .collect::<EdgeList>()
        };

        let edges: Vec<EdgeList> = match schedule {
            Schedule::Parallel => scaled.par_iter().enumerate().map(search).collect(),
            Schedule::Sequential => scaled.iter().enumerate().map(search).collect(),
        };

        let lookup = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.spectrum, i))
            .collect();

        debug!(
            vertices = vertices.len(),
            skipped,
            k,
            parallel = schedule == Schedule::Parallel,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "neighbour graph built"
        );

        Ok(SpatialNeighbourGraph {
            vertices,
            lookup,
            edges,
            scale,
            k,
        })
    }

    /// Neighbours of `spectrum` with their physical distances.
    ///
    /// `radius == 0` returns all `k` precomputed neighbours. `radius > 0` keeps those at a
    /// physical distance `<= radius`; this only filters the precomputed set (see the
    /// module documentation).
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::SpectrumNotFound`] if `spectrum` is not a vertex.
    /// * [`SpecGeomError::InvalidArgument`] if `radius` is negative or not finite.
    pub fn neighbours(
        &self,
        spectrum: SpectrumNumber,
        radius: f64,
    ) -> Result<NeighbourMap, SpecGeomError> {
        Ok(self
            .nearest(spectrum, radius)?
            .into_iter()
            .collect::<NeighbourMap>())
    }

    /// Same selection as [`SpatialNeighbourGraph::neighbours`], as a list sorted by
    /// increasing scaled distance.
    pub fn nearest(
        &self,
        spectrum: SpectrumNumber,
        radius: f64,
    ) -> Result<Vec<(SpectrumNumber, Distance)>, SpecGeomError> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(SpecGeomError::InvalidArgument(format!(
                "radius must be finite and >= 0, got {radius}"
            )));
        }
        let vertex = *self
            .lookup
            .get(&spectrum)
            .ok_or(SpecGeomError::SpectrumNotFound(spectrum))?;

        Ok(self.edges[vertex]
            .iter()
            .filter(|e| radius == 0.0 || e.distance <= radius)
            .map(|e| (self.vertices[e.target].spectrum, e.distance))
            .collect())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// The `k` the graph was built with.
    pub fn neighbour_count(&self) -> usize {
        self.k
    }

    pub fn scale(&self) -> &ScaleVector {
        &self.scale
    }

    pub fn contains(&self, spectrum: SpectrumNumber) -> bool {
        self.lookup.contains_key(&spectrum)
    }

    /// Unscaled representative position of a vertex.
    pub fn position(&self, spectrum: SpectrumNumber) -> Option<V3D> {
        self.lookup
            .get(&spectrum)
            .map(|&i| self.vertices[i].position)
    }

    /// Vertices in build order.
    pub fn spectra(&self) -> impl Iterator<Item = SpectrumNumber> + '_ {
        self.vertices.iter().map(|v| v.spectrum)
    }
}
