//! Live observer table fed by NATS ingress.

use dashmap::DashMap;
use streamer_core::{Observer, ObserverSource};
use streamer_math::Vec3;

/// Connected participants and their last reported positions.
#[derive(Debug, Default)]
pub struct ObserverTable {
    positions: DashMap<u64, Vec3>,
}

impl ObserverTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a participant's position, adding it if new.
    pub fn update(&self, observer: u64, position: Vec3) {
        self.positions.insert(observer, position);
    }

    /// Drop a participant. Returns `false` if it was not known.
    pub fn remove(&self, observer: u64) -> bool {
        self.positions.remove(&observer).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl ObserverSource for ObserverTable {
    /// Snapshot ordered by observer id, so per-observer results line up from
    /// tick to tick.
    fn observers(&self) -> Vec<Observer> {
        let mut observers: Vec<Observer> = self
            .positions
            .iter()
            .map(|entry| Observer::new(*entry.key(), *entry.value()))
            .collect();
        observers.sort_unstable_by_key(|o| o.id);
        observers
    }
}
