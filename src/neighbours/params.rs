use std::fmt;

use crate::constants::{DEFAULT_NEIGHBOUR_COUNT, EXTENT_EPS, V3D};
use crate::geometry::BoundingBox;
use crate::specgeom_errors::SpecGeomError;

/// Per-axis multiplier applied to positions before neighbour distances are compared.
///
/// Elongated sensors (tubes) sit much closer together along one axis than along the
/// others; scaling each axis by the inverse pixel extent makes "one pixel away" the same
/// distance in every direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleVector(V3D);

impl Default for ScaleVector {
    fn default() -> Self {
        Self::unit()
    }
}

impl ScaleVector {
    /// Isotropic scale: plain Euclidean distance.
    pub fn unit() -> Self {
        ScaleVector(V3D::new(1.0, 1.0, 1.0))
    }

    /// Explicit scale factors.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::InvalidNeighbourParameter`] if a component is not finite and > 0.
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, SpecGeomError> {
        let v = V3D::new(x, y, z);
        if v.iter().all(|c| c.is_finite() && *c > 0.0) {
            Ok(ScaleVector(v))
        } else {
            Err(SpecGeomError::InvalidNeighbourParameter(format!(
                "scale components must be finite and > 0, got ({x}, {y}, {z})"
            )))
        }
    }

    /// Scale derived from the bounding box of a representative pixel.
    ///
    /// Each axis is multiplied by the reciprocal of the pixel extent along it, so distances
    /// are measured in pixel units. Degenerate or non-finite axes keep a factor of 1.
    pub fn from_pixel_extent(bbox: &BoundingBox) -> Self {
        ScaleVector(bbox.extent().map(|e| {
            if e.is_finite() && e.abs() > EXTENT_EPS {
                1.0 / e.abs()
            } else {
                1.0
            }
        }))
    }

    pub fn as_vector(&self) -> &V3D {
        &self.0
    }

    /// Component-wise product of `position` with the scale.
    pub fn apply(&self, position: &V3D) -> V3D {
        position.component_mul(&self.0)
    }
}

/// Configuration of the nearest-neighbour graph.
///
/// Use [`NeighbourParams::builder`] to override defaults with validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourParams {
    /// Number of neighbours precomputed per vertex (`k`).
    pub neighbour_count: usize,
    /// Anisotropic distance scaling.
    pub scale: ScaleVector,
    /// Leave spectra fed only by monitors out of the graph.
    pub exclude_monitors: bool,
    /// Radius used by callers that do not pass one explicitly; 0 means "all k neighbours".
    pub default_radius: f64,
}

impl Default for NeighbourParams {
    fn default() -> Self {
        NeighbourParams {
            neighbour_count: DEFAULT_NEIGHBOUR_COUNT,
            scale: ScaleVector::unit(),
            exclude_monitors: true,
            default_radius: 0.0,
        }
    }
}

impl NeighbourParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> NeighbourParamsBuilder {
        NeighbourParamsBuilder::new()
    }
}

/// Builder for [`NeighbourParams`], with validation.
#[derive(Debug, Clone)]
pub struct NeighbourParamsBuilder {
    params: NeighbourParams,
}

impl Default for NeighbourParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighbourParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: NeighbourParams::default(),
        }
    }

    pub fn neighbour_count(mut self, v: usize) -> Self {
        self.params.neighbour_count = v;
        self
    }

    pub fn scale(mut self, v: ScaleVector) -> Self {
        self.params.scale = v;
        self
    }

    pub fn exclude_monitors(mut self, v: bool) -> Self {
        self.params.exclude_monitors = v;
        self
    }

    pub fn default_radius(mut self, v: f64) -> Self {
        self.params.default_radius = v;
        self
    }

    /// Validate and return the parameters.
    ///
    /// Errors
    /// ----------
    /// * [`SpecGeomError::InvalidNeighbourParameter`] if `neighbour_count == 0` or
    ///   `default_radius` is negative or not finite.
    pub fn build(self) -> Result<NeighbourParams, SpecGeomError> {
        let p = &self.params;
        if p.neighbour_count == 0 {
            return Err(SpecGeomError::InvalidNeighbourParameter(
                "neighbour_count must be >= 1".into(),
            ));
        }
        if !(p.default_radius.is_finite() && p.default_radius >= 0.0) {
            return Err(SpecGeomError::InvalidNeighbourParameter(
                "default_radius must be finite and >= 0".into(),
            ));
        }
        Ok(self.params)
    }
}

impl fmt::Display for NeighbourParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.scale.as_vector();
        if f.alternate() {
            writeln!(f, "Neighbour Graph Parameters")?;
            writeln!(f, "--------------------------")?;
            writeln!(f, "  neighbour_count  = {:<24}# k", self.neighbour_count)?;
            writeln!(
                f,
                "  scale            = {:<24}# per-axis multiplier",
                format!("({:.4}, {:.4}, {:.4})", s.x, s.y, s.z)
            )?;
            writeln!(
                f,
                "  exclude_monitors = {:<24}# skip monitor-only spectra",
                self.exclude_monitors
            )?;
            writeln!(
                f,
                "  default_radius   = {:<24}# 0 = all k neighbours",
                format!("{:.4} m", self.default_radius)
            )
        } else {
            write!(
                f,
                "NeighbourParams(k={}, scale=({:.4}, {:.4}, {:.4}), exclude_monitors={}, default_radius={:.4})",
                self.neighbour_count, s.x, s.y, s.z, self.exclude_monitors, self.default_radius
            )
        }
    }
}

#[cfg(test)]
mod params_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builder_defaults() {
        let params = NeighbourParams::builder().build().unwrap();
        assert_eq!(params, NeighbourParams::default());
        assert_eq!(params.neighbour_count, DEFAULT_NEIGHBOUR_COUNT);
    }

    #[test]
    fn test_builder_rejects_zero_k() {
        let err = NeighbourParams::builder()
            .neighbour_count(0)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SpecGeomError::InvalidNeighbourParameter("neighbour_count must be >= 1".into())
        );
    }

    #[test]
    fn test_builder_rejects_negative_radius() {
        assert!(NeighbourParams::builder()
            .default_radius(-1.0)
            .build()
            .is_err());
        assert!(NeighbourParams::builder()
            .default_radius(f64::NAN)
            .build()
            .is_err());
    }

    #[test]
    fn test_scale_validation() {
        assert!(ScaleVector::new(1.0, 0.0, 1.0).is_err());
        assert!(ScaleVector::new(1.0, f64::INFINITY, 1.0).is_err());
        let s = ScaleVector::new(2.0, 1.0, 0.5).unwrap();
        assert_eq!(s.apply(&V3D::new(1.0, 1.0, 1.0)), V3D::new(2.0, 1.0, 0.5));
    }

    #[test]
    fn test_scale_from_tube_pixel() {
        // 8 mm wide, 2.5 cm long along y, flat in z
        let bbox = BoundingBox::new(V3D::new(-0.004, -0.0125, 0.0), V3D::new(0.004, 0.0125, 0.0));
        let s = ScaleVector::from_pixel_extent(&bbox);
        assert_relative_eq!(s.as_vector().x, 125.0, epsilon = 1e-9);
        assert_relative_eq!(s.as_vector().y, 40.0, epsilon = 1e-9);
        assert_eq!(s.as_vector().z, 1.0);
    }

    #[test]
    fn test_display_alternate() {
        let text = format!("{:#}", NeighbourParams::default());
        assert!(text.starts_with("Neighbour Graph Parameters"));
        assert!(text.contains("neighbour_count  = 8"));
    }
}
