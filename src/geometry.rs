//! # Instrument geometry collaborator
//!
//! The index and the neighbour graph never own instrument geometry; they query it through
//! the [`GeometryResolver`] trait. This module defines that seam together with:
//!
//! - [`ComponentId`] – an opaque, stable handle on a geometry component. It has
//!   identity semantics only (`Eq + Hash`) and deliberately no ordering.
//! - [`BoundingBox`] – an axis-aligned box in the laboratory frame.
//! - [`ComponentArena`] – a small in-memory component tree that owns the real component
//!   records and hands out [`ComponentId`]s. It implements [`GeometryResolver`] and is what
//!   tests, benches and simple callers use in place of a full instrument definition.
//!
//! ## Frames & conventions
//!
//! Component positions and rotations are stored **relative to their parent**. The absolute
//! state is composed on demand:
//!
//! ```text
//! abs_pos(c) = abs_pos(parent) + abs_rot(parent) * rel_pos(c)
//! abs_rot(c) = abs_rot(parent) * rel_rot(c)
//! ```
//!
//! Shapes are given as a local [`BoundingBox`] around the component origin; the resolved
//! bounding box is the axis-aligned hull of the rotated and translated local box.
//!
//! ## Partial assembly
//!
//! A detector may be registered before it is placed (see [`ComponentArena::add_detector`]
//! with `None` as position). Every resolver method returns `None` for such components,
//! which is how "geometry not yet fully assembled" shows up to consumers.

use ahash::RandomState;
use std::collections::HashMap;

use crate::constants::{DetectorId, Quat, V3D};
use crate::specgeom_errors::SpecGeomError;

/// Opaque handle on a geometry component.
///
/// Handles are only meaningful for the arena that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Raw handle value, for diagnostics only.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Axis-aligned bounding box in the laboratory frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: V3D,
    pub max: V3D,
}

impl BoundingBox {
    /// Build a box from two opposite corners, in any order.
    pub fn new(a: V3D, b: V3D) -> Self {
        BoundingBox {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Box of half-extents `half` centred on the origin.
    pub fn centred(half: V3D) -> Self {
        let half = half.abs();
        BoundingBox::new(-half, half)
    }

    /// Extent of the box along each axis.
    pub fn extent(&self) -> V3D {
        self.max - self.min
    }

    pub fn centre(&self) -> V3D {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: &V3D) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [V3D; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            V3D::new(lo.x, lo.y, lo.z),
            V3D::new(hi.x, lo.y, lo.z),
            V3D::new(lo.x, hi.y, lo.z),
            V3D::new(hi.x, hi.y, lo.z),
            V3D::new(lo.x, lo.y, hi.z),
            V3D::new(hi.x, lo.y, hi.z),
            V3D::new(lo.x, hi.y, hi.z),
            V3D::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Axis-aligned hull of this box once rotated by `rotation` then moved by `translation`.
    pub fn transformed(&self, rotation: &Quat, translation: &V3D) -> Self {
        let corners = self.corners().map(|c| rotation * c + translation);
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min = min.inf(c);
            max = max.sup(c);
        }
        BoundingBox { min, max }
    }
}

/// Read access to assembled instrument geometry.
///
/// Every method may return `None` while the geometry is only partially assembled.
/// Implementations must be shareable across the worker threads of numeric loops.
pub trait GeometryResolver: Send + Sync {
    /// Absolute position of the detector with the given id.
    fn resolve_position(&self, detector: DetectorId) -> Option<V3D>;

    /// Absolute position of an arbitrary component.
    fn resolve_component_position(&self, component: ComponentId) -> Option<V3D>;

    /// Absolute rotation of a component.
    fn resolve_rotation(&self, component: ComponentId) -> Option<Quat>;

    /// Laboratory-frame bounding box of a component.
    fn resolve_bounding_box(&self, component: ComponentId) -> Option<BoundingBox>;

    /// Detector id carried by a component, if it is a detector.
    fn detector_id(&self, component: ComponentId) -> Option<DetectorId>;

    /// Whether a detector is a beam monitor rather than a scattering detector.
    fn is_monitor(&self, _detector: DetectorId) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
struct ComponentRecord {
    name: String,
    parent: Option<ComponentId>,
    relative_position: Option<V3D>,
    relative_rotation: Quat,
    shape: Option<BoundingBox>,
    detector: Option<DetectorId>,
    monitor: bool,
}

/// In-memory owner of geometry components.
///
/// The arena is the only owner of component records; everything else (the cache in
/// particular) refers to components through [`ComponentId`] handles.
#[derive(Debug, Clone, Default)]
pub struct ComponentArena {
    components: Vec<ComponentRecord>,
    detectors: HashMap<DetectorId, ComponentId, RandomState>,
}

impl ComponentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn push(&mut self, record: ComponentRecord) -> ComponentId {
        let id = ComponentId(self.components.len() as u32);
        self.components.push(record);
        id
    }

    fn record(&self, component: ComponentId) -> Result<&ComponentRecord, SpecGeomError> {
        self.components.get(component.0 as usize).ok_or_else(|| {
            SpecGeomError::InvalidArgument(format!("unknown component handle {}", component.0))
        })
    }

    fn record_mut(&mut self, component: ComponentId) -> Result<&mut ComponentRecord, SpecGeomError> {
        self.components
            .get_mut(component.0 as usize)
            .ok_or_else(|| {
                SpecGeomError::InvalidArgument(format!("unknown component handle {}", component.0))
            })
    }

    /// Add a top-level (parentless) assembly such as a bank or the sample position.
    pub fn add_component(&mut self, name: &str, position: V3D, rotation: Quat) -> ComponentId {
        self.push(ComponentRecord {
            name: name.to_string(),
            parent: None,
            relative_position: Some(position),
            relative_rotation: rotation,
            shape: None,
            detector: None,
            monitor: false,
        })
    }

    /// Add a sub-assembly placed relative to `parent`.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::InvalidArgument`] if `parent` was not issued by this arena.
    pub fn add_child(
        &mut self,
        parent: ComponentId,
        name: &str,
        relative_position: V3D,
        relative_rotation: Quat,
    ) -> Result<ComponentId, SpecGeomError> {
        self.record(parent)?;
        Ok(self.push(ComponentRecord {
            name: name.to_string(),
            parent: Some(parent),
            relative_position: Some(relative_position),
            relative_rotation,
            shape: None,
            detector: None,
            monitor: false,
        }))
    }

    /// Register a detector pixel.
    ///
    /// Arguments
    /// -----------------
    /// * `parent`: Optional assembly the pixel is mounted on.
    /// * `detector`: Detector id; must not already be registered.
    /// * `relative_position`: Position relative to the parent, or `None` if the pixel is not
    ///   placed yet (all position queries then resolve to `None`).
    /// * `shape`: Local bounding box of the pixel around its origin.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::InvalidArgument`] for an unknown parent or a duplicated detector id.
    pub fn add_detector(
        &mut self,
        parent: Option<ComponentId>,
        detector: DetectorId,
        relative_position: Option<V3D>,
        shape: Option<BoundingBox>,
    ) -> Result<ComponentId, SpecGeomError> {
        if let Some(parent) = parent {
            self.record(parent)?;
        }
        if self.detectors.contains_key(&detector) {
            return Err(SpecGeomError::InvalidArgument(format!(
                "detector {detector} registered twice"
            )));
        }
        let id = self.push(ComponentRecord {
            name: format!("pixel-{detector}"),
            parent,
            relative_position,
            relative_rotation: Quat::identity(),
            shape,
            detector: Some(detector),
            monitor: false,
        });
        self.detectors.insert(detector, id);
        Ok(id)
    }

    /// Register a beam monitor; it resolves like a detector but reports `is_monitor`.
    pub fn add_monitor(
        &mut self,
        detector: DetectorId,
        position: V3D,
    ) -> Result<ComponentId, SpecGeomError> {
        let id = self.add_detector(None, detector, Some(position), None)?;
        self.record_mut(id)?.monitor = true;
        Ok(id)
    }

    /// Move a component relative to its parent. Children follow.
    ///
    /// Any cache built over this arena is stale afterwards and must be invalidated.
    pub fn set_relative_position(
        &mut self,
        component: ComponentId,
        position: V3D,
    ) -> Result<(), SpecGeomError> {
        self.record_mut(component)?.relative_position = Some(position);
        Ok(())
    }

    pub fn set_relative_rotation(
        &mut self,
        component: ComponentId,
        rotation: Quat,
    ) -> Result<(), SpecGeomError> {
        self.record_mut(component)?.relative_rotation = rotation;
        Ok(())
    }

    pub fn component_for_detector(&self, detector: DetectorId) -> Option<ComponentId> {
        self.detectors.get(&detector).copied()
    }

    pub fn name(&self, component: ComponentId) -> Option<&str> {
        self.record(component).ok().map(|r| r.name.as_str())
    }

    /// Absolute position and rotation, `None` if the component or an ancestor is unplaced.
    fn absolute_frame(&self, component: ComponentId) -> Option<(V3D, Quat)> {
        let record = self.record(component).ok()?;
        let rel_pos = record.relative_position?;
        match record.parent {
            None => Some((rel_pos, record.relative_rotation)),
            Some(parent) => {
                let (parent_pos, parent_rot) = self.absolute_frame(parent)?;
                Some((
                    parent_pos + parent_rot * rel_pos,
                    parent_rot * record.relative_rotation,
                ))
            }
        }
    }
}

impl GeometryResolver for ComponentArena {
    fn resolve_position(&self, detector: DetectorId) -> Option<V3D> {
        self.resolve_component_position(self.component_for_detector(detector)?)
    }

    fn resolve_component_position(&self, component: ComponentId) -> Option<V3D> {
        self.absolute_frame(component).map(|(pos, _)| pos)
    }

    fn resolve_rotation(&self, component: ComponentId) -> Option<Quat> {
        self.absolute_frame(component).map(|(_, rot)| rot)
    }

    fn resolve_bounding_box(&self, component: ComponentId) -> Option<BoundingBox> {
        let shape = self.record(component).ok()?.shape?;
        let (pos, rot) = self.absolute_frame(component)?;
        Some(shape.transformed(&rot, &pos))
    }

    fn detector_id(&self, component: ComponentId) -> Option<DetectorId> {
        self.record(component).ok()?.detector
    }

    fn is_monitor(&self, detector: DetectorId) -> bool {
        self.component_for_detector(detector)
            .and_then(|c| self.record(c).ok())
            .is_some_and(|r| r.monitor)
    }
}
