//! # streamer_net
//!
//! NATS ingress for the entity streamer server.
//!
//! This crate provides:
//!
//! - [`subjects`] NATS subject constants.
//! - [`messages`] observer and lifecycle payloads, and [`Ingress`] to route them.
//! - [`codec`] MessagePack serialisation helpers.
//! - [`connection`] NATS connection management.
//! - [`error`] network-layer error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod messages;
pub mod subjects;

pub use codec::{decode, encode};
pub use connection::NatsConnection;
pub use error::NetError;
pub use messages::{Ingress, LifecycleNotice, ObserverLeft, ObserverUpdate};
