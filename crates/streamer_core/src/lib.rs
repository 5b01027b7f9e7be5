//! # streamer_core
//!
//! Decides, tick by tick, which registered entities are materialized in the
//! world so that each observer sees the entities nearest to them without any
//! class exceeding its visible quota.
//!
//! This crate provides:
//!
//! - [`VisibilityAllocator`] per-class registry and nearest-first admission.
//! - [`LivenessRegistry`] pins on occupied entities and vacancy respawn timing.
//! - [`EligibilityQueue`] keyed, comparator-ordered queue backing the registry.
//! - [`Scheduler`] the recurring tick loop over every entity class.
//! - [`EventBridge`] routes world lifecycle events to the owning allocator.
//! - [`WorldEngine`] the seam to whatever actually creates and destroys entities.

pub mod allocator;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod liveness;
pub mod observer;
pub mod queue;
pub mod scheduler;

pub use allocator::{StreamDelta, VisibilityAllocator};
pub use bridge::EventBridge;
pub use config::{GridConfig, SchedulerConfig, StreamLimits};
pub use engine::{EngineError, InMemoryWorld, WorldEngine};
pub use error::StreamError;
pub use grid::SpatialGrid;
pub use liveness::{LivenessRegistry, Vacancy};
pub use observer::{Observer, ObserverId, ObserverSource};
pub use queue::EligibilityQueue;
pub use scheduler::{EntityStreamer, Scheduler, SchedulerState};
