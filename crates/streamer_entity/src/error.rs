//! Descriptor validation errors.

/// Errors raised while constructing an [`EntityDescriptor`](crate::EntityDescriptor).
///
/// Validation is eager: a descriptor that exists is always well-formed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DescriptorError {
    /// The kind carries an out-of-range model or malformed payload.
    #[error("invalid {class} kind: {reason}")]
    InvalidKind {
        /// Class name of the offending kind.
        class: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A position component is NaN or infinite.
    #[error("position must be finite, got ({x}, {y}, {z})")]
    InvalidPosition { x: f32, y: f32, z: f32 },

    /// The orientation is not a finite unit quaternion.
    #[error("orientation must be a finite unit quaternion")]
    InvalidOrientation,

    /// A respawn delay of zero was supplied.
    #[error("respawn delay must be greater than zero")]
    InvalidRespawnDelay,
}
