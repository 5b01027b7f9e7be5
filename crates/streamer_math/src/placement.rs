//! World placement of a streamed entity.
//!
//! [`Placement`] is the position and orientation an entity is materialized
//! with. It never carries scale: streamed entities take their size from the
//! model the world engine instantiates.

use glam::{EulerRot, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Project a world position onto the horizontal X/Y plane.
#[inline]
#[must_use]
pub fn planar(position: Vec3) -> Vec2 {
    Vec2::new(position.x, position.y)
}

/// Squared distance between two points on the horizontal plane.
///
/// Visibility checks compare squared distances only; no square root is taken
/// per candidate pair.
#[inline]
#[must_use]
pub fn planar_distance_squared(a: Vec3, b: Vec3) -> f32 {
    planar(a).distance_squared(planar(b))
}

/// Position and orientation of a placed entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Placement {
    /// World-space position.
    pub position: Vec3,
    /// Orientation as a unit quaternion. Identity when omitted.
    #[serde(default)]
    pub rotation: Quat,
}

impl Placement {
    /// The origin with no rotation.
    pub const ORIGIN: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a placement at the given position with no rotation.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::ORIGIN
        }
    }

    /// Create a placement from a position and a heading in degrees, measured
    /// as a rotation about the vertical (Z) axis.
    #[must_use]
    pub fn from_heading(position: Vec3, heading_degrees: f32) -> Self {
        Self {
            position,
            rotation: Quat::from_rotation_z(heading_degrees.to_radians()),
        }
    }

    /// Heading in degrees about the vertical axis, in `[0, 360)`.
    #[must_use]
    pub fn heading(&self) -> f32 {
        let (_, _, z) = self.rotation.to_euler(EulerRot::XYZ);
        z.to_degrees().rem_euclid(360.0)
    }

    /// Squared planar distance from this placement to a point.
    #[must_use]
    pub fn planar_distance_squared(&self, point: Vec3) -> f32 {
        planar_distance_squared(self.position, point)
    }

    /// Returns `true` if the position has no NaN or infinite component.
    #[must_use]
    pub fn has_finite_position(&self) -> bool {
        self.position.is_finite()
    }

    /// Returns `true` if the rotation is finite and of unit length.
    #[must_use]
    pub fn has_valid_rotation(&self) -> bool {
        self.rotation.is_finite() && self.rotation.is_normalized()
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::ORIGIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_placement() {
        let p = Placement::ORIGIN;
        assert_eq!(p.position, Vec3::ZERO);
        assert_eq!(p.rotation, Quat::IDENTITY);
        assert!(p.has_valid_rotation());
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 500.0);
        assert!((planar_distance_squared(a, b) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_from_heading_round_trips() {
        let p = Placement::from_heading(Vec3::new(1.0, 2.0, 3.0), 90.0);
        assert!((p.heading() - 90.0).abs() < 1e-3);
        assert!(p.has_valid_rotation());
    }

    #[test]
    fn test_invalid_components_detected() {
        let p = Placement::from_position(Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(!p.has_finite_position());

        let q = Placement {
            position: Vec3::ZERO,
            rotation: Quat::from_xyzw(0.0, 0.0, 0.0, 2.0),
        };
        assert!(!q.has_valid_rotation());
    }
}
