//! # streamer_entity
//!
//! The data the streamer moves around: what may be placed in the world, and
//! how the world refers to what it has placed.
//!
//! This crate provides:
//!
//! - [`EntityDescriptor`] immutable, validated description of a placeable entity.
//! - [`EntityKind`] vehicle, prop, pickup or label payload.
//! - [`Attributes`] free-form visual/behavioural attributes.
//! - [`LiveHandle`] the world engine's token for a materialized entity.
//! - [`HandleAllocator`] monotonically increasing handle allocator.
//! - [`LifecycleEvent`] notifications about live entities raised by the world.

pub mod attributes;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod handle;
pub mod kind;

pub use attributes::{AttributeValue, Attributes};
pub use descriptor::{DescriptorId, DescriptorSpec, EntityDescriptor};
pub use error::DescriptorError;
pub use event::LifecycleEvent;
pub use handle::{HandleAllocator, LiveHandle};
pub use kind::EntityKind;
