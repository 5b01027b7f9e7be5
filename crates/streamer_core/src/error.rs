//! Streaming error types.

use streamer_entity::{DescriptorId, LiveHandle};

use crate::engine::EngineError;

/// Errors that can occur while registering, streaming or scheduling entities.
///
/// Errors raised inside a scheduled tick never escape the scheduler: they are
/// logged and counted against the entity class that raised them.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// A quota, distance or interval is zero, negative or not finite.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The descriptor is not registered (or not pinned, for `unpin`).
    #[error("unknown entity {0}")]
    UnknownEntity(DescriptorId),

    /// No registered descriptor currently owns this live handle.
    #[error("unknown live handle {0}")]
    UnknownHandle(LiveHandle),

    /// The descriptor is already registered with this allocator.
    #[error("entity {0} is already registered")]
    AlreadyRegistered(DescriptorId),

    /// Only descriptors with a respawn delay can be pinned.
    #[error("entity {0} is ephemeral and cannot be pinned")]
    NotPersistent(DescriptorId),

    /// The world engine failed to create or destroy an entity.
    #[error("world engine failure: {0}")]
    EngineFailure(#[from] EngineError),

    /// The named component was disposed and no longer accepts calls.
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    /// The operation is not valid in the component's current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}
