//! Observers: the connected participants visibility is computed for.

use serde::{Deserialize, Serialize};
use streamer_math::Vec3;

/// Identifies a connected participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(pub u64);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Observer({})", self.0)
    }
}

/// A participant and where it currently is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub id: ObserverId,
    pub position: Vec3,
}

impl Observer {
    #[must_use]
    pub fn new(id: u64, position: Vec3) -> Self {
        Self {
            id: ObserverId(id),
            position,
        }
    }
}

/// Supplies the current observer set.
///
/// Polled fresh on every scheduled tick; implementations must not hand out a
/// cached list from an earlier tick.
pub trait ObserverSource: Send + Sync {
    fn observers(&self) -> Vec<Observer>;
}

/// A fixed observer list. Handy for tools and tests.
impl ObserverSource for Vec<Observer> {
    fn observers(&self) -> Vec<Observer> {
        self.clone()
    }
}

impl ObserverSource for parking_lot::RwLock<Vec<Observer>> {
    fn observers(&self) -> Vec<Observer> {
        self.read().clone()
    }
}
