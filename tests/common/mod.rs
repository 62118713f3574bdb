#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use specgeom::geometry::{BoundingBox, ComponentArena, ComponentId, GeometryResolver};
use specgeom::{DetectorId, Quat, V3D};

/// Distance between neighbouring tubes, along x.
pub const TUBE_SPACING: f64 = 0.01;
/// Distance between neighbouring pixels of a tube, along y.
pub const PIXEL_PITCH: f64 = 0.004;

/// Bank of vertical tubes: detector `tube * pixels_per_tube + pixel` sits at
/// `(tube * TUBE_SPACING, pixel * PIXEL_PITCH, 0)`.
pub fn tube_bank(n_tubes: i32, pixels_per_tube: i32) -> (ComponentArena, Vec<ComponentId>) {
    let mut arena = ComponentArena::new();
    let bank = arena.add_component("bank", V3D::new(0.0, 0.0, 4.0), Quat::identity());
    let mut pixels = Vec::new();
    for tube in 0..n_tubes {
        for pixel in 0..pixels_per_tube {
            let id = arena
                .add_detector(
                    Some(bank),
                    tube_pixel(tube, pixel, pixels_per_tube),
                    Some(V3D::new(
                        tube as f64 * TUBE_SPACING,
                        pixel as f64 * PIXEL_PITCH,
                        0.0,
                    )),
                    Some(pixel_shape()),
                )
                .unwrap();
            pixels.push(id);
        }
    }
    (arena, pixels)
}

pub fn tube_pixel(tube: i32, pixel: i32, pixels_per_tube: i32) -> DetectorId {
    tube * pixels_per_tube + pixel
}

/// Local shape of one tube pixel.
pub fn pixel_shape() -> BoundingBox {
    BoundingBox::centred(V3D::new(TUBE_SPACING / 2.0, PIXEL_PITCH / 2.0, TUBE_SPACING / 2.0))
}

/// `n` detectors (ids `0..n`) scattered uniformly in a 2 m cube.
pub fn random_cloud(n: i32, seed: u64) -> (ComponentArena, Vec<ComponentId>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut arena = ComponentArena::new();
    let pixels = (0..n)
        .map(|d| {
            let p = V3D::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            arena.add_detector(None, d, Some(p), None).unwrap()
        })
        .collect();
    (arena, pixels)
}

/// Geometry that can be edited while a cache holds it, to exercise invalidation.
#[derive(Debug, Default)]
pub struct EditableGeometry {
    pub arena: RwLock<ComponentArena>,
}

impl EditableGeometry {
    pub fn new(arena: ComponentArena) -> Arc<Self> {
        Arc::new(EditableGeometry {
            arena: RwLock::new(arena),
        })
    }
}

impl GeometryResolver for EditableGeometry {
    fn resolve_position(&self, detector: DetectorId) -> Option<V3D> {
        self.arena.read().resolve_position(detector)
    }

    fn resolve_component_position(&self, component: ComponentId) -> Option<V3D> {
        self.arena.read().resolve_component_position(component)
    }

    fn resolve_rotation(&self, component: ComponentId) -> Option<Quat> {
        self.arena.read().resolve_rotation(component)
    }

    fn resolve_bounding_box(&self, component: ComponentId) -> Option<BoundingBox> {
        self.arena.read().resolve_bounding_box(component)
    }

    fn detector_id(&self, component: ComponentId) -> Option<DetectorId> {
        self.arena.read().detector_id(component)
    }

    fn is_monitor(&self, detector: DetectorId) -> bool {
        self.arena.read().is_monitor(detector)
    }
}
