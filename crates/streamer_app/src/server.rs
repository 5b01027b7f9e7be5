//! Wiring of allocators, scheduler and event bridge into one server.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use streamer_core::{EventBridge, Scheduler, VisibilityAllocator, WorldEngine};
use streamer_entity::{DescriptorSpec, EntityDescriptor};
use streamer_net::Ingress;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::observers::ObserverTable;

/// Everything the streamer runs, built from an [`AppConfig`].
#[derive(Debug)]
pub struct StreamerServer {
    scheduler: Scheduler,
    allocators: HashMap<String, Arc<VisibilityAllocator>>,
    bridge: EventBridge,
    observers: Arc<ObserverTable>,
    rejected_notices: AtomicU64,
}

impl StreamerServer {
    /// Create one allocator per configured class, all streaming into
    /// `engine`, and register them with a fresh scheduler and bridge.
    ///
    /// # Errors
    ///
    /// Returns an error if any class or scheduler setting is invalid.
    pub fn build(config: &AppConfig, engine: Arc<dyn WorldEngine>) -> Result<Self> {
        let observers = Arc::new(ObserverTable::new());
        let scheduler = Scheduler::new(config.scheduler()?, observers.clone())?;
        let bridge = EventBridge::new();
        let mut allocators = HashMap::new();

        for class in &config.classes {
            let allocator = Arc::new(VisibilityAllocator::with_grid(
                class.class.clone(),
                class.limits()?,
                class.grid(),
                engine.clone(),
            )?);
            scheduler.add_allocator(allocator.clone());
            bridge.attach(allocator.clone());
            allocators.insert(class.class.clone(), allocator);
        }

        Ok(Self {
            scheduler,
            allocators,
            bridge,
            observers,
            rejected_notices: AtomicU64::new(0),
        })
    }

    /// Register startup placements with the allocator of their class.
    ///
    /// Placements that fail validation or name an unconfigured class are
    /// logged and skipped. Returns how many were registered.
    pub fn seed(&self, placements: &[DescriptorSpec]) -> usize {
        let mut registered = 0;
        for (index, spec) in placements.iter().enumerate() {
            match self.register(spec.clone()) {
                Ok(()) => registered += 1,
                Err(e) => warn!(index, error = %format!("{e:#}"), "skipping placement"),
            }
        }
        info!(registered, total = placements.len(), "placements seeded");
        registered
    }

    fn register(&self, spec: DescriptorSpec) -> Result<()> {
        let descriptor = EntityDescriptor::new(spec)?;
        let class = descriptor.class();
        let allocator = self
            .allocators
            .get(class)
            .with_context(|| format!("no allocator configured for class {class:?}"))?;
        allocator.add(Arc::new(descriptor))?;
        Ok(())
    }

    /// Apply one ingress message.
    pub fn apply(&self, ingress: Ingress) {
        match ingress {
            Ingress::ObserverUpdate(update) => {
                self.observers.update(update.observer, update.position);
            }
            Ingress::ObserverLeft(left) => {
                if !self.observers.remove(left.observer) {
                    debug!(observer = left.observer, "leave for unknown observer");
                }
            }
            Ingress::Lifecycle(notice) => {
                if let Err(e) = self.bridge.handle(notice.event) {
                    let rejected = self.rejected_notices.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(error = %e, rejected, "lifecycle notice rejected");
                }
            }
        }
    }

    /// Start the scheduler loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler was already started or disposed.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        Ok(self.scheduler.start()?)
    }

    /// Stop scheduling and tear down every live entity.
    pub fn shutdown(&self) {
        self.scheduler.dispose();
        for allocator in self.allocators.values() {
            allocator.dispose();
        }
    }

    #[must_use]
    pub fn allocator(&self, class: &str) -> Option<&Arc<VisibilityAllocator>> {
        self.allocators.get(class)
    }

    #[must_use]
    pub fn observers(&self) -> &ObserverTable {
        &self.observers
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Lifecycle notices the bridge refused since startup.
    #[must_use]
    pub fn rejected_notices(&self) -> u64 {
        self.rejected_notices.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use streamer_core::InMemoryWorld;
    use streamer_entity::{EntityKind, LifecycleEvent, LiveHandle};
    use streamer_math::{Placement, Vec3};
    use streamer_net::{LifecycleNotice, ObserverLeft, ObserverUpdate};

    use super::*;

    fn server(world: &Arc<InMemoryWorld>) -> StreamerServer {
        StreamerServer::build(&AppConfig::default(), world.clone()).unwrap()
    }

    fn vehicle(x: f32) -> DescriptorSpec {
        DescriptorSpec::new(
            EntityKind::Vehicle { model: 411 },
            Placement::from_position(Vec3::new(x, 0.0, 0.0)),
        )
        .with_respawn_delay(std::time::Duration::from_secs(60))
    }

    #[test]
    fn test_seed_routes_by_class_and_skips_invalid() {
        let world = Arc::new(InMemoryWorld::new());
        let server = server(&world);
        let placements = vec![
            vehicle(0.0),
            DescriptorSpec::new(EntityKind::Prop { model: 1_337 }, Placement::ORIGIN),
            DescriptorSpec::new(EntityKind::Vehicle { model: 7 }, Placement::ORIGIN),
        ];
        assert_eq!(server.seed(&placements), 2);
        assert_eq!(server.allocator("vehicle").unwrap().len(), 1);
        assert_eq!(server.allocator("prop").unwrap().len(), 1);
    }

    #[test]
    fn test_unconfigured_class_is_skipped() {
        let world = Arc::new(InMemoryWorld::new());
        let config = AppConfig::parse(
            r#"{ "classes": [{ "class": "prop", "max_visible_per_tick": 5, "max_distance": 10.0 }] }"#,
        )
        .unwrap();
        let server = StreamerServer::build(&config, world).unwrap();
        assert_eq!(server.seed(&[vehicle(0.0)]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingress_drives_streaming() {
        let world = Arc::new(InMemoryWorld::new());
        let server = server(&world);
        server.seed(&[vehicle(10.0)]);

        server.apply(Ingress::ObserverUpdate(ObserverUpdate {
            observer: 1,
            position: Vec3::ZERO,
        }));
        assert_eq!(server.observers().len(), 1);

        server.scheduler().run_pass().await;
        assert_eq!(world.live_count(), 1);

        // The in-memory world hands out handles from 1.
        let handle = LiveHandle::from_raw(1);
        assert!(server.allocator("vehicle").unwrap().resolve(handle).is_some());
        server.apply(Ingress::Lifecycle(LifecycleNotice {
            event: LifecycleEvent::OccupantEntered { handle },
        }));
        assert_eq!(server.rejected_notices(), 0);

        // The only observer leaves; the occupied vehicle stays.
        server.apply(Ingress::ObserverLeft(ObserverLeft { observer: 1 }));
        server.apply(Ingress::ObserverUpdate(ObserverUpdate {
            observer: 2,
            position: Vec3::new(9_000.0, 0.0, 0.0),
        }));
        server.scheduler().run_pass().await;
        assert_eq!(world.live_count(), 1);

        server.shutdown();
        assert_eq!(world.live_count(), 0);
    }

    #[test]
    fn test_rejected_notices_are_counted() {
        let world = Arc::new(InMemoryWorld::new());
        let server = server(&world);

        server.apply(Ingress::Lifecycle(LifecycleNotice {
            event: LifecycleEvent::OccupantEntered {
                handle: LiveHandle::from_raw(404),
            },
        }));
        server.apply(Ingress::Lifecycle(LifecycleNotice {
            event: LifecycleEvent::LastOccupantLeft {
                handle: LiveHandle::from_raw(404),
            },
        }));
        assert_eq!(server.rejected_notices(), 2);
    }
}
