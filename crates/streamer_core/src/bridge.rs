//! Event bridge: lifecycle notifications into liveness and registry updates.
//!
//! The world reports what happens to live entities by [`LiveHandle`]. The
//! bridge finds which attached allocator owns the handle and translates:
//!
//! | Event               | Effect |
//! |---------------------|--------|
//! | `OccupantEntered`   | pin the descriptor |
//! | `LastOccupantLeft`  | unpin it; its vacancy countdown starts |
//! | `EntityDestroyed`   | drop the dead handle; unregister ephemeral descriptors, reset persistent ones |

use std::sync::Arc;

use parking_lot::RwLock;
use streamer_entity::{EntityDescriptor, LifecycleEvent, LiveHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::allocator::VisibilityAllocator;
use crate::error::StreamError;

/// Routes lifecycle events to the allocator that owns the entity.
#[derive(Debug, Default)]
pub struct EventBridge {
    allocators: RwLock<Vec<Arc<VisibilityAllocator>>>,
}

impl EventBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route events for `allocator`'s entities through this bridge.
    pub fn attach(&self, allocator: Arc<VisibilityAllocator>) {
        debug!(class = allocator.class(), "allocator attached to event bridge");
        self.allocators.write().push(allocator);
    }

    fn owner(
        &self,
        handle: LiveHandle,
    ) -> Option<(Arc<VisibilityAllocator>, Arc<EntityDescriptor>)> {
        self.allocators.read().iter().find_map(|allocator| {
            allocator
                .resolve(handle)
                .map(|descriptor| (Arc::clone(allocator), descriptor))
        })
    }

    /// Apply one lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::UnknownHandle`] if no attached allocator owns
    /// the handle, [`StreamError::NotPersistent`] when an ephemeral entity is
    /// occupied, [`StreamError::UnknownEntity`] when the last occupant leaves
    /// an entity that was never pinned, or whatever the allocator or registry
    /// reports.
    pub fn handle(&self, event: LifecycleEvent) -> Result<(), StreamError> {
        let result = self.dispatch(event);
        if let Err(e) = &result {
            warn!(?event, error = %e, "lifecycle event rejected");
        }
        result
    }

    fn dispatch(&self, event: LifecycleEvent) -> Result<(), StreamError> {
        let handle = event.handle();
        let (allocator, descriptor) = self
            .owner(handle)
            .ok_or(StreamError::UnknownHandle(handle))?;
        let id = descriptor.id();
        let now = Instant::now();

        match event {
            LifecycleEvent::OccupantEntered { .. } => {
                allocator.liveness().pin(&descriptor, now)?;
                debug!(class = allocator.class(), descriptor = %id, %handle, "occupied");
            }
            LifecycleEvent::LastOccupantLeft { .. } => {
                allocator.liveness().unpin(id, now)?;
                debug!(class = allocator.class(), descriptor = %id, %handle, "vacated");
            }
            LifecycleEvent::EntityDestroyed { .. } => {
                allocator.release(handle)?;
                if descriptor.is_persistent() {
                    allocator.liveness().forget(id)?;
                    info!(class = allocator.class(), descriptor = %id, %handle, "persistent entity destroyed, awaiting re-materialization");
                } else {
                    allocator.delete(id)?;
                    info!(class = allocator.class(), descriptor = %id, %handle, "ephemeral entity destroyed and unregistered");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use streamer_entity::{DescriptorSpec, EntityKind};
    use streamer_math::{Placement, Vec3};

    use super::*;
    use crate::config::StreamLimits;
    use crate::engine::InMemoryWorld;
    use crate::observer::Observer;

    struct Fixture {
        world: Arc<InMemoryWorld>,
        allocator: Arc<VisibilityAllocator>,
        bridge: EventBridge,
    }

    fn fixture() -> Fixture {
        let world = Arc::new(InMemoryWorld::new());
        let allocator = Arc::new(
            VisibilityAllocator::new("vehicle", StreamLimits::new(10, 100.0).unwrap(), world.clone())
                .unwrap(),
        );
        let bridge = EventBridge::new();
        bridge.attach(allocator.clone());
        Fixture {
            world,
            allocator,
            bridge,
        }
    }

    fn materialize(f: &Fixture, delay: Option<u64>) -> (Arc<EntityDescriptor>, LiveHandle) {
        let mut spec = DescriptorSpec::new(
            EntityKind::Vehicle { model: 541 },
            Placement::from_position(Vec3::new(1.0, 1.0, 0.0)),
        );
        spec.respawn_delay = delay.map(Duration::from_secs);
        let d = Arc::new(EntityDescriptor::new(spec).unwrap());
        f.allocator.add(d.clone()).unwrap();
        f.allocator
            .stream(&[Observer::new(1, Vec3::ZERO)], 10, 100.0)
            .unwrap();
        let handle = f.allocator.handle_of(d.id()).unwrap();
        (d, handle)
    }

    #[test]
    fn test_occupancy_pins_and_unpins() {
        let f = fixture();
        let (d, handle) = materialize(&f, Some(60));

        f.bridge
            .handle(LifecycleEvent::OccupantEntered { handle })
            .unwrap();
        assert!(f.allocator.liveness().is_pinned(d.id()).unwrap());

        f.bridge
            .handle(LifecycleEvent::LastOccupantLeft { handle })
            .unwrap();
        assert!(!f.allocator.liveness().is_pinned(d.id()).unwrap());
        assert_eq!(f.allocator.liveness().pending(), 1);
    }

    #[test]
    fn test_unknown_handle() {
        let f = fixture();
        let err = f
            .bridge
            .handle(LifecycleEvent::OccupantEntered {
                handle: LiveHandle::from_raw(999),
            })
            .unwrap_err();
        assert!(matches!(err, StreamError::UnknownHandle(_)));
    }

    #[test]
    fn test_ephemeral_destroyed_is_unregistered() {
        let f = fixture();
        let (d, handle) = materialize(&f, None);
        f.world.remove(handle);

        f.bridge
            .handle(LifecycleEvent::EntityDestroyed { handle })
            .unwrap();
        assert!(!f.allocator.contains(d.id()));
        // The engine was not asked to destroy it a second time.
        assert_eq!(f.world.totals().1, 0);
    }

    #[test]
    fn test_persistent_destroyed_is_rematerialized() {
        let f = fixture();
        let (d, handle) = materialize(&f, Some(60));
        f.bridge
            .handle(LifecycleEvent::OccupantEntered { handle })
            .unwrap();
        f.world.remove(handle);

        f.bridge
            .handle(LifecycleEvent::EntityDestroyed { handle })
            .unwrap();
        assert!(f.allocator.contains(d.id()));
        assert!(!f.allocator.liveness().is_pinned(d.id()).unwrap());
        assert!(f.allocator.handle_of(d.id()).is_none());

        let delta = f
            .allocator
            .stream(&[Observer::new(1, Vec3::ZERO)], 10, 100.0)
            .unwrap();
        assert_eq!(delta.to_create, vec![d.id()]);
        assert!(f.world.is_live(d.id()));
    }

    #[test]
    fn test_occupying_ephemeral_is_rejected() {
        let f = fixture();
        let (_, handle) = materialize(&f, None);
        assert!(matches!(
            f.bridge.handle(LifecycleEvent::OccupantEntered { handle }),
            Err(StreamError::NotPersistent(_))
        ));
    }
}
