//! Message types received by the streamer.
//!
//! All message types derive `Serialize` and `Deserialize` for MessagePack
//! transport. The subject a message arrives on determines its type; see
//! [`Ingress::decode`].

use serde::{Deserialize, Serialize};
use streamer_entity::LifecycleEvent;
use streamer_math::Vec3;

use crate::codec::decode;
use crate::error::NetError;
use crate::subjects;

// ── Observers ───────────────────────────────────────────────────────────────

/// A participant's current position. Published on
/// [`subjects::OBSERVER_UPDATE`] when it connects and whenever it moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverUpdate {
    /// Participant id, stable for the lifetime of its connection.
    pub observer: u64,
    pub position: Vec3,
}

/// A participant disconnected. Published on [`subjects::OBSERVER_LEAVE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverLeft {
    pub observer: u64,
}

// ── Entity lifecycle ────────────────────────────────────────────────────────

/// A lifecycle event raised by the world. Published on
/// [`subjects::LIFECYCLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleNotice {
    pub event: LifecycleEvent,
}

// ── Routing ─────────────────────────────────────────────────────────────────

/// Any message the streamer accepts, decoded according to its subject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ingress {
    ObserverUpdate(ObserverUpdate),
    ObserverLeft(ObserverLeft),
    Lifecycle(LifecycleNotice),
}

impl Ingress {
    /// Decode `payload` as the message type carried on `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::UnknownSubject`] for subjects the streamer does
    /// not handle, or [`NetError::Decode`] for a malformed payload.
    pub fn decode(subject: &str, payload: &[u8]) -> Result<Self, NetError> {
        match subject {
            subjects::OBSERVER_UPDATE => Ok(Self::ObserverUpdate(decode(payload)?)),
            subjects::OBSERVER_LEAVE => Ok(Self::ObserverLeft(decode(payload)?)),
            subjects::LIFECYCLE => Ok(Self::Lifecycle(decode(payload)?)),
            other => Err(NetError::UnknownSubject(other.to_string())),
        }
    }
}
