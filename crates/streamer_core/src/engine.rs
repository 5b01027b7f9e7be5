//! World engine seam.
//!
//! The streamer never instantiates anything itself; it tells a
//! [`WorldEngine`] what to create and destroy. [`InMemoryWorld`] is a headless
//! engine that only tracks what is live, used by the server binary and tests.

use std::collections::HashMap;

use parking_lot::Mutex;
use streamer_entity::{DescriptorId, EntityDescriptor, HandleAllocator, LiveHandle};
use tracing::debug;

/// Opaque failure reported by a world engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Materializes and tears down entities.
///
/// Calls are synchronous. The allocator is the only caller, and never calls
/// `create` twice for the same descriptor without a `destroy` in between.
pub trait WorldEngine: Send + Sync {
    /// Materialize `descriptor`, returning the handle that identifies it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the entity could not be created.
    fn create(&self, descriptor: &EntityDescriptor) -> Result<LiveHandle, EngineError>;

    /// Tear down a previously created entity.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the handle is unknown to the engine.
    fn destroy(&self, handle: LiveHandle) -> Result<(), EngineError>;
}

#[derive(Debug, Default)]
struct WorldState {
    handles: HandleAllocator,
    live: HashMap<LiveHandle, DescriptorId>,
    created: u64,
    destroyed: u64,
}

/// Headless world engine that records live entities in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorld {
    state: Mutex<WorldState>,
}

impl InMemoryWorld {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Returns `true` if some live entity was created from `id`.
    #[must_use]
    pub fn is_live(&self, id: DescriptorId) -> bool {
        self.state.lock().live.values().any(|d| *d == id)
    }

    /// The descriptor a live handle was created from.
    #[must_use]
    pub fn descriptor_of(&self, handle: LiveHandle) -> Option<DescriptorId> {
        self.state.lock().live.get(&handle).copied()
    }

    /// Total `(create, destroy)` calls served.
    #[must_use]
    pub fn totals(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.created, state.destroyed)
    }

    /// Drop a live entity without going through the streamer, the way the
    /// world does when an entity is destroyed in play.
    pub fn remove(&self, handle: LiveHandle) -> Option<DescriptorId> {
        self.state.lock().live.remove(&handle)
    }
}

impl WorldEngine for InMemoryWorld {
    fn create(&self, descriptor: &EntityDescriptor) -> Result<LiveHandle, EngineError> {
        let mut state = self.state.lock();
        let handle = state.handles.allocate();
        state.live.insert(handle, descriptor.id());
        state.created += 1;
        debug!(%handle, descriptor = %descriptor.id(), class = descriptor.class(), "entity created");
        Ok(handle)
    }

    fn destroy(&self, handle: LiveHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.live.remove(&handle).is_none() {
            return Err(EngineError::new(format!("{handle} is not live")));
        }
        state.destroyed += 1;
        debug!(%handle, "entity destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use streamer_entity::{DescriptorSpec, EntityKind};
    use streamer_math::Placement;

    use super::*;

    fn prop() -> EntityDescriptor {
        EntityDescriptor::new(DescriptorSpec::new(
            EntityKind::Prop { model: 1225 },
            Placement::ORIGIN,
        ))
        .unwrap()
    }

    #[test]
    fn test_create_and_destroy() {
        let world = InMemoryWorld::new();
        let d = prop();
        let h = world.create(&d).unwrap();
        assert!(h.is_valid());
        assert!(world.is_live(d.id()));
        assert_eq!(world.descriptor_of(h), Some(d.id()));

        world.destroy(h).unwrap();
        assert_eq!(world.live_count(), 0);
        assert_eq!(world.totals(), (1, 1));
    }

    #[test]
    fn test_destroy_unknown_handle_fails() {
        let world = InMemoryWorld::new();
        assert!(world.destroy(LiveHandle::from_raw(7)).is_err());
    }
}
