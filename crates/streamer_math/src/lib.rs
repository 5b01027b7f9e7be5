//! # streamer_math
//!
//! Math types for the entity streamer. Re-exports [`glam`] for linear algebra
//! and defines the spatial types shared by descriptors and the visibility
//! allocator.
//!
//! The world is Z-up: "planar" distance is measured on the X/Y plane and
//! ignores height.

pub mod placement;

// Re-export glam types for convenience.
pub use glam::{EulerRot, Quat, Vec2, Vec3};

pub use placement::{Placement, planar, planar_distance_squared};
