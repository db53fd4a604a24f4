//! # Shapes
//!
//! Tagged shape descriptors and the reference-counted shape they build.

use glam::Vec3;
use rapier3d::geometry::SharedShape;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// Geometry of a shape.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeKind {
    /// Axis-aligned box.
    Box {
        /// Half size along each axis.
        half_extents: Vec3,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Y-aligned capsule.
    Capsule {
        /// Radius of the caps.
        radius: f32,
        /// Half height of the cylindrical part.
        half_height: f32,
    },
    /// Y-aligned cylinder.
    Cylinder {
        /// Radius.
        radius: f32,
        /// Half height.
        half_height: f32,
    },
}

/// Shape descriptor: geometry plus density.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeDesc {
    /// Geometry.
    pub kind: ShapeKind,
    /// Mass density in kg/m^3. Non-positive values use [`ShapeDesc::DEFAULT_DENSITY`].
    pub density: f32,
}

impl ShapeDesc {
    /// Density used when none is given.
    pub const DEFAULT_DENSITY: f32 = 1000.0;

    /// Box with default density.
    #[must_use]
    pub const fn cuboid(half_extents: Vec3) -> Self {
        Self {
            kind: ShapeKind::Box { half_extents },
            density: Self::DEFAULT_DENSITY,
        }
    }

    /// Sphere with default density.
    #[must_use]
    pub const fn sphere(radius: f32) -> Self {
        Self {
            kind: ShapeKind::Sphere { radius },
            density: Self::DEFAULT_DENSITY,
        }
    }

    /// Capsule with default density.
    #[must_use]
    pub const fn capsule(radius: f32, half_height: f32) -> Self {
        Self {
            kind: ShapeKind::Capsule {
                radius,
                half_height,
            },
            density: Self::DEFAULT_DENSITY,
        }
    }

    /// Cylinder with default density.
    #[must_use]
    pub const fn cylinder(radius: f32, half_height: f32) -> Self {
        Self {
            kind: ShapeKind::Cylinder {
                radius,
                half_height,
            },
            density: Self::DEFAULT_DENSITY,
        }
    }

    /// Replaces the density.
    #[must_use]
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Density actually used.
    #[inline]
    #[must_use]
    pub fn effective_density(&self) -> f32 {
        if self.density > 0.0 && self.density.is_finite() {
            self.density
        } else {
            Self::DEFAULT_DENSITY
        }
    }
}

/// A built shape. Cheap to clone; clones share geometry.
#[derive(Clone)]
pub struct Shape {
    shared: SharedShape,
    density: f32,
    kind: ShapeKind,
}

impl Shape {
    /// Builds a shape from a descriptor.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidShape`] if any dimension is not finite and
    /// strictly positive.
    pub fn from_desc(desc: &ShapeDesc) -> PhysicsResult<Self> {
        let shared = match desc.kind {
            ShapeKind::Box { half_extents } => {
                check_dims("box", &half_extents.to_array())?;
                SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
            ShapeKind::Sphere { radius } => {
                check_dims("sphere", &[radius])?;
                SharedShape::ball(radius)
            }
            ShapeKind::Capsule {
                radius,
                half_height,
            } => {
                check_dims("capsule", &[radius, half_height])?;
                SharedShape::capsule_y(half_height, radius)
            }
            ShapeKind::Cylinder {
                radius,
                half_height,
            } => {
                check_dims("cylinder", &[radius, half_height])?;
                SharedShape::cylinder(half_height, radius)
            }
        };
        Ok(Self {
            shared,
            density: desc.effective_density(),
            kind: desc.kind,
        })
    }

    /// Density used for mass properties.
    #[inline]
    #[must_use]
    pub const fn density(&self) -> f32 {
        self.density
    }

    /// Geometry this shape was built from.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub(crate) fn shared(&self) -> &SharedShape {
        &self.shared
    }
}

impl std::fmt::Debug for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shape")
            .field("kind", &self.kind)
            .field("density", &self.density)
            .finish()
    }
}

fn check_dims(what: &str, dims: &[f32]) -> PhysicsResult<()> {
    if dims.iter().all(|d| d.is_finite() && *d > 0.0) {
        Ok(())
    } else {
        Err(PhysicsError::InvalidShape(format!(
            "{what} dimensions must be finite and > 0, got {dims:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_shapes_build() {
        for desc in [
            ShapeDesc::cuboid(Vec3::new(1.0, 0.5, 2.0)),
            ShapeDesc::sphere(0.3),
            ShapeDesc::capsule(0.5, 0.5),
            ShapeDesc::cylinder(0.2, 1.0),
        ] {
            let shape = Shape::from_desc(&desc).unwrap();
            assert_eq!(shape.kind(), desc.kind);
        }
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        assert!(Shape::from_desc(&ShapeDesc::sphere(0.0)).is_err());
        assert!(Shape::from_desc(&ShapeDesc::capsule(0.5, f32::NAN)).is_err());
        assert!(Shape::from_desc(&ShapeDesc::cuboid(Vec3::new(1.0, -1.0, 1.0))).is_err());
    }

    #[test]
    fn test_density_fallback() {
        let shape = Shape::from_desc(&ShapeDesc::sphere(1.0).with_density(0.0)).unwrap();
        assert!((shape.density() - ShapeDesc::DEFAULT_DENSITY).abs() < f32::EPSILON);

        let shape = Shape::from_desc(&ShapeDesc::sphere(1.0).with_density(250.0)).unwrap();
        assert!((shape.density() - 250.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_descriptor_from_toml() {
        let desc: ShapeDesc = toml::from_str(
            "density = 500.0\n[kind]\ntype = \"capsule\"\nradius = 0.4\nhalf_height = 0.9\n",
        )
        .unwrap();
        assert_eq!(
            desc.kind,
            ShapeKind::Capsule {
                radius: 0.4,
                half_height: 0.9
            }
        );
    }
}
