//! # Constants and type definitions for specgeom
//!
//! This module centralizes the **identifier aliases**, **geometric primitives** and
//! **default tuning values** shared by the index, the neighbour graph and the cache.
//!
//! ## Overview
//!
//! - Logical / physical identifiers ([`SpectrumNumber`], [`DetectorId`])
//! - Geometric aliases over [nalgebra](https://docs.rs/nalgebra) ([`V3D`], [`Quat`])
//! - The result container of neighbour queries ([`NeighbourMap`])
//! - Defaults used when building the nearest-neighbour graph

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};

// -------------------------------------------------------------------------------------------------
// Identifiers
// -------------------------------------------------------------------------------------------------

/// Logical measurement channel identifier.
///
/// Not necessarily contiguous nor positive. Uniqueness inside an index is not enforced.
pub type SpectrumNumber = i32;

/// Physical sensor identifier.
pub type DetectorId = i32;

// -------------------------------------------------------------------------------------------------
// Geometry
// -------------------------------------------------------------------------------------------------

/// 3-D position or displacement, in metres.
pub type V3D = Vector3<f64>;

/// Orientation of a component relative to the laboratory frame.
pub type Quat = UnitQuaternion<f64>;

/// Physical (unscaled) Euclidean distance, in metres.
pub type Distance = f64;

/// Result of a neighbour query: neighbouring spectrum → physical distance.
pub type NeighbourMap = HashMap<SpectrumNumber, Distance, ahash::RandomState>;

// -------------------------------------------------------------------------------------------------
// Defaults
// -------------------------------------------------------------------------------------------------

/// Number of nearest neighbours precomputed per vertex when nothing else is configured.
///
/// Eight covers the full ring of a pixel on a square detector grid.
pub const DEFAULT_NEIGHBOUR_COUNT: usize = 8;

/// Tolerance under which a bounding-box extent is considered degenerate.
pub const EXTENT_EPS: f64 = 1e-12;
