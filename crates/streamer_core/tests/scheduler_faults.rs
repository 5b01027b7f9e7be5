//! A failing or panicking entity class must not stall the others.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use streamer_core::{
    EntityStreamer, InMemoryWorld, Observer, Scheduler, SchedulerConfig, SchedulerState,
    StreamDelta, StreamError, StreamLimits, VisibilityAllocator,
};
use streamer_entity::{DescriptorSpec, EntityDescriptor, EntityKind};
use streamer_math::{Placement, Vec3};

enum Fault {
    Error,
    Panic,
}

struct Faulty {
    class: &'static str,
    fault: Fault,
    calls: AtomicUsize,
}

impl Faulty {
    fn new(class: &'static str, fault: Fault) -> Arc<Self> {
        Arc::new(Self {
            class,
            fault,
            calls: AtomicUsize::new(0),
        })
    }
}

impl EntityStreamer for Faulty {
    fn class(&self) -> &str {
        self.class
    }

    fn len(&self) -> usize {
        1
    }

    fn tick(&self, _observers: &[Observer]) -> Result<StreamDelta, StreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::Error => Err(StreamError::InvalidState("world offline")),
            Fault::Panic => panic!("tick exploded"),
        }
    }
}

fn pickups(world: &Arc<InMemoryWorld>) -> Arc<VisibilityAllocator> {
    let allocator =
        VisibilityAllocator::new("pickup", StreamLimits::new(4, 100.0).unwrap(), world.clone())
            .unwrap();
    for i in 0..3 {
        let d = EntityDescriptor::new(DescriptorSpec::new(
            EntityKind::Pickup {
                model: 1_240,
                pickup_type: 2,
            },
            Placement::from_position(Vec3::new(i as f32 * 10.0, 0.0, 0.0)),
        ))
        .unwrap();
        allocator.add(Arc::new(d)).unwrap();
    }
    Arc::new(allocator)
}

#[tokio::test(start_paused = true)]
async fn healthy_class_keeps_streaming_past_faults() {
    let world = Arc::new(InMemoryWorld::new());
    let observers = Arc::new(RwLock::new(vec![Observer::new(1, Vec3::ZERO)]));
    let scheduler = Scheduler::new(
        SchedulerConfig::default().with_tick_interval(Duration::from_millis(300)),
        observers,
    )
    .unwrap();

    let broken = Faulty::new("broken", Fault::Error);
    let exploding = Faulty::new("exploding", Fault::Panic);
    scheduler.add_allocator(broken.clone());
    scheduler.add_allocator(exploding.clone());
    scheduler.add_allocator(pickups(&world));

    for _ in 0..3 {
        assert_eq!(scheduler.run_pass().await, 3);
    }

    assert_eq!(world.live_count(), 3);
    assert_eq!(broken.calls.load(Ordering::SeqCst), 3);
    assert_eq!(exploding.calls.load(Ordering::SeqCst), 3);
    assert_eq!(scheduler.failure_count("broken"), 3);
    assert_eq!(scheduler.failure_count("exploding"), 3);
    assert_eq!(scheduler.failure_count("pickup"), 0);
    assert_eq!(scheduler.pass_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn observer_changes_are_seen_on_the_next_pass() {
    let world = Arc::new(InMemoryWorld::new());
    let observers: Arc<RwLock<Vec<Observer>>> = Arc::new(RwLock::new(Vec::new()));
    let scheduler = Scheduler::new(SchedulerConfig::default(), observers.clone()).unwrap();
    scheduler.add_allocator(pickups(&world));

    scheduler.run_pass().await;
    assert_eq!(world.live_count(), 0);

    observers.write().push(Observer::new(7, Vec3::new(5.0, 0.0, 0.0)));
    scheduler.run_pass().await;
    assert_eq!(world.live_count(), 3);

    observers.write().clear();
    observers
        .write()
        .push(Observer::new(7, Vec3::new(9_000.0, 0.0, 0.0)));
    scheduler.run_pass().await;
    assert_eq!(world.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dispose_stops_the_loop() {
    let world = Arc::new(InMemoryWorld::new());
    let observers = Arc::new(RwLock::new(vec![Observer::new(1, Vec3::ZERO)]));
    let scheduler = Scheduler::new(SchedulerConfig::default(), observers).unwrap();
    scheduler.add_allocator(pickups(&world));

    let task = scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1_250)).await;
    scheduler.dispose();
    task.await.unwrap();

    let passes = scheduler.pass_count();
    assert!(passes >= 2);
    assert_eq!(scheduler.state(), SchedulerState::Disposed);
    assert!(matches!(scheduler.start(), Err(StreamError::InvalidState(_))));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(scheduler.pass_count(), passes);
}
