//! Lifecycle notifications raised by the world about materialized entities.
//!
//! These are the inputs of the event bridge. They reference entities by the
//! [`LiveHandle`] the world engine issued, since the world knows nothing about
//! descriptors.

use serde::{Deserialize, Serialize};

use crate::handle::LiveHandle;

/// Something happened to a live entity outside the streamer's control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A participant started using the entity (e.g. entered a vehicle).
    OccupantEntered { handle: LiveHandle },
    /// The last participant stopped using the entity.
    LastOccupantLeft { handle: LiveHandle },
    /// The world destroyed the entity on its own (e.g. a vehicle exploded).
    EntityDestroyed { handle: LiveHandle },
}

impl LifecycleEvent {
    /// The handle the event refers to.
    #[must_use]
    pub fn handle(&self) -> LiveHandle {
        match self {
            Self::OccupantEntered { handle }
            | Self::LastOccupantLeft { handle }
            | Self::EntityDestroyed { handle } => *handle,
        }
    }
}
