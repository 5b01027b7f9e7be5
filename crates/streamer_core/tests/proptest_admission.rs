//! Property tests for admission and the eligibility queue.
//!
//! Random descriptor layouts and observer sets are streamed against the
//! in-memory world, and the admission guarantees are checked on every result.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use streamer_core::{EligibilityQueue, InMemoryWorld, Observer, StreamLimits, VisibilityAllocator};
use streamer_entity::{DescriptorSpec, EntityDescriptor, EntityKind};
use streamer_math::{Placement, Vec3, planar_distance_squared};

/// World coordinates on a coarse lattice so distance ties actually occur.
fn coord() -> impl Strategy<Value = f32> {
    (-200i32..200i32).prop_map(|v| v as f32 * 5.0)
}

fn position() -> impl Strategy<Value = Vec3> {
    (coord(), coord(), -50i32..50i32).prop_map(|(x, y, z)| Vec3::new(x, y, z as f32))
}

fn prop_at(position: Vec3) -> Arc<EntityDescriptor> {
    Arc::new(
        EntityDescriptor::new(DescriptorSpec::new(
            EntityKind::Prop { model: 1_337 },
            Placement::from_position(position),
        ))
        .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn admission_respects_quota_range_and_share(
        placements in prop::collection::vec(position(), 0..80),
        observer_positions in prop::collection::vec(position(), 1..8),
        quota in 1usize..40,
        distance in 10u32..800,
    ) {
        let distance = distance as f32;
        let world = Arc::new(InMemoryWorld::new());
        let allocator = VisibilityAllocator::new(
            "prop",
            StreamLimits::new(quota, distance).unwrap(),
            world.clone(),
        )
        .unwrap();

        let mut positions = HashMap::new();
        for p in placements {
            let d = prop_at(p);
            positions.insert(d.id(), p);
            allocator.add(d).unwrap();
        }
        let observers: Vec<Observer> = observer_positions
            .iter()
            .enumerate()
            .map(|(i, p)| Observer::new(i as u64, *p))
            .collect();

        let delta = allocator.stream(&observers, quota, distance).unwrap();
        let share = quota / observers.len();

        prop_assert!(delta.visible.len() <= quota);
        prop_assert_eq!(delta.per_observer.len(), observers.len());
        for (_, accepted) in &delta.per_observer {
            prop_assert!(*accepted <= share);
        }
        for id in &delta.visible {
            let p = positions[id];
            let in_range = observers
                .iter()
                .any(|o| planar_distance_squared(o.position, p) <= distance * distance);
            prop_assert!(in_range);
        }
        prop_assert_eq!(world.live_count(), delta.visible.len());

        // Nothing moved, so a second pass changes nothing.
        let again = allocator.stream(&observers, quota, distance).unwrap();
        prop_assert!(again.is_empty());
        prop_assert_eq!(again.visible, delta.visible);
    }

    #[test]
    fn nearest_descriptors_win(
        placements in prop::collection::vec(position(), 1..60),
        share in 1usize..10,
    ) {
        let world = Arc::new(InMemoryWorld::new());
        let allocator = VisibilityAllocator::new(
            "prop",
            StreamLimits::new(share, 5_000.0).unwrap(),
            world,
        )
        .unwrap();

        let mut ranked = Vec::new();
        for p in placements {
            let d = prop_at(p);
            ranked.push((planar_distance_squared(Vec3::ZERO, p), d.id()));
            allocator.add(d).unwrap();
        }
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        let expected: Vec<_> = ranked.iter().take(share).map(|(_, id)| *id).collect();

        let delta = allocator
            .stream(&[Observer::new(0, Vec3::ZERO)], share, 5_000.0)
            .unwrap();
        let mut admitted: Vec<_> = delta.visible.into_iter().collect();
        let mut expected = expected;
        admitted.sort();
        expected.sort();
        prop_assert_eq!(admitted, expected);
    }

    #[test]
    fn queue_pops_in_comparator_order(
        ops in prop::collection::vec((0u8..20, 0u32..50), 1..100),
    ) {
        let mut queue = EligibilityQueue::new(|a: &u32, b: &u32| a.cmp(b));
        let mut model: HashMap<u8, u32> = HashMap::new();
        for (key, value) in ops {
            let previous = queue.push(key, value);
            prop_assert_eq!(previous, model.insert(key, value));
            prop_assert!(queue.has(&key));
            prop_assert_eq!(queue.len(), model.len());
        }

        let mut last = 0u32;
        while let Some((key, value)) = queue.pop() {
            prop_assert!(value >= last);
            prop_assert!(!queue.has(&key));
            prop_assert_eq!(model.remove(&key), Some(value));
            last = value;
        }
        prop_assert!(model.is_empty());
    }
}
