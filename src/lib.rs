//! # specgeom
//!
//! Geometry indexing for neutron / muon scattering data reduction.
//!
//! The crate relates logical measurement channels (**spectra**) to physical sensors
//! (**detectors**), answers spatial nearest-neighbour queries over detector positions, and
//! caches derived geometric quantities with explicit invalidation.
//!
//! ## Modules
//!
//! * [`spectrum_index`] – [`SpectrumDetectorIndex`] in its general (many ↔ many) and
//!   contiguous-range (one ↔ one) forms, plus the shared
//!   [`IndexCursor`](crate::spectrum_index::cursor::IndexCursor).
//! * [`neighbours`] – [`SpatialNeighbourGraph`], a k-nearest-neighbour graph over spectra
//!   with anisotropic distance scaling, and its [`NeighbourParams`].
//! * [`geometry_cache`] – [`GeometryCache`], per-component memo of position, rotation and
//!   bounding box that also owns the lazily built neighbour graph.
//! * [`geometry`] – the [`GeometryResolver`] seam to instrument geometry and the in-memory
//!   [`ComponentArena`].
//! * [`workspace`] – [`DetectorWorkspace`], owner of the active index and its cache.
//! * [`constants`] – identifier and geometry aliases, defaults.
//! * [`specgeom_errors`] – [`SpecGeomError`] and its [`ErrorKind`] classification.
//!
//! ## Threading model
//!
//! Data-parallel loops over spectra read the index and the cache from many threads.
//! A published index is immutable; the cache serialises population per table and builds
//! the neighbour graph once per invalidation epoch. See the module documentation of
//! [`geometry_cache`] for the invalidation contract.

pub mod constants;
pub mod geometry;
pub mod geometry_cache;
pub mod neighbours;
pub mod specgeom_errors;
pub mod spectrum_index;
pub mod workspace;

pub use constants::{DetectorId, NeighbourMap, Quat, SpectrumNumber, V3D};
pub use geometry::{BoundingBox, ComponentArena, ComponentId, GeometryResolver};
pub use geometry_cache::GeometryCache;
pub use neighbours::params::{NeighbourParams, ScaleVector};
pub use neighbours::SpatialNeighbourGraph;
pub use specgeom_errors::{ErrorKind, SpecGeomError};
pub use spectrum_index::{IndexEntry, SpectrumDetectorIndex};
pub use workspace::DetectorWorkspace;
