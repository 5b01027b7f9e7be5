//! Streaming scheduler: the recurring tick loop over entity classes.
//!
//! The scheduler holds one [`EntityStreamer`] per entity class and runs them
//! one at a time on a single tokio task. Each pass:
//!
//! 1. Snapshots the streamers that currently hold at least one descriptor.
//! 2. Splits the tick interval evenly between them.
//! 3. For each: polls the observers, runs its tick, then sleeps for its slice.
//!
//! A streamer that errors or panics is logged and counted; the pass moves on
//! to the next one. Streamers never run concurrently with each other, and each
//! runs at most once per pass.
//!
//! `dispose` is cooperative: the tick in flight finishes, a pending sleep is
//! cut short, and no further tick is started.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::allocator::StreamDelta;
use crate::config::SchedulerConfig;
use crate::error::StreamError;
use crate::observer::{Observer, ObserverSource};

/// One entity class the scheduler can tick.
///
/// Every allocator exposes this capability uniformly, whatever it streams.
pub trait EntityStreamer: Send + Sync {
    /// Class name used in logs and failure counters (e.g. `"vehicle"`).
    fn class(&self) -> &str;

    /// Number of registered descriptors. Empty streamers are skipped.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute and apply visibility for `observers`.
    ///
    /// # Errors
    ///
    /// Any [`StreamError`]; the scheduler contains it within this tick.
    fn tick(&self, observers: &[Observer]) -> Result<StreamDelta, StreamError>;
}

/// Lifecycle of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Disposed,
}

struct Shared {
    config: SchedulerConfig,
    observers: Arc<dyn ObserverSource>,
    streamers: RwLock<Vec<Arc<dyn EntityStreamer>>>,
    state: Mutex<SchedulerState>,
    wake: Notify,
    /// Completed passes.
    passes: AtomicU64,
    /// Contained tick failures per class.
    failures: DashMap<String, u64>,
}

/// Drives every registered entity class on a fixed cadence.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create an idle scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfiguration`] for a zero tick interval.
    pub fn new(
        config: SchedulerConfig,
        observers: Arc<dyn ObserverSource>,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                observers,
                streamers: RwLock::new(Vec::new()),
                state: Mutex::new(SchedulerState::Idle),
                wake: Notify::new(),
                passes: AtomicU64::new(0),
                failures: DashMap::new(),
            }),
        })
    }

    /// Register an entity class. Safe before or after [`Scheduler::start`];
    /// a running loop picks it up from its next pass.
    pub fn add_allocator(&self, streamer: Arc<dyn EntityStreamer>) {
        let class = streamer.class().to_string();
        let mut streamers = self.shared.streamers.write();
        streamers.push(streamer);
        info!(class, classes = streamers.len(), "allocator registered");
    }

    /// Number of registered entity classes.
    #[must_use]
    pub fn allocator_count(&self) -> usize {
        self.shared.streamers.read().len()
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.shared.state.lock()
    }

    /// Passes completed so far.
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.shared.passes.load(Ordering::Relaxed)
    }

    /// Contained failures recorded for `class`.
    #[must_use]
    pub fn failure_count(&self, class: &str) -> u64 {
        self.shared.failures.get(class).map_or(0, |n| *n)
    }

    /// Move Idle → Running and spawn the loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidState`] unless the scheduler is idle.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self) -> Result<JoinHandle<()>, StreamError> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                SchedulerState::Idle => *state = SchedulerState::Running,
                SchedulerState::Running => {
                    return Err(StreamError::InvalidState("scheduler is already running"));
                }
                SchedulerState::Disposed => {
                    return Err(StreamError::InvalidState("scheduler has been disposed"));
                }
            }
        }

        info!(
            tick_interval_ms = self.shared.config.tick_interval.as_millis() as u64,
            classes = self.allocator_count(),
            "starting streaming scheduler"
        );

        let scheduler = self.clone();
        Ok(tokio::spawn(async move { scheduler.run().await }))
    }

    /// Stop the loop. The tick in flight completes; no further tick starts.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.shared.state.lock(), SchedulerState::Disposed);
        self.shared.wake.notify_waiters();
        if previous != SchedulerState::Disposed {
            info!(passes = self.pass_count(), "streaming scheduler disposed");
        }
    }

    async fn run(&self) {
        while self.state() == SchedulerState::Running {
            self.run_pass().await;
        }
        info!(passes = self.pass_count(), "streaming scheduler stopped");
    }

    /// Run one pass over the non-empty streamers, sleeping between them.
    ///
    /// Returns how many streamers were ticked. Does nothing once disposed.
    pub async fn run_pass(&self) -> usize {
        if self.state() == SchedulerState::Disposed {
            return 0;
        }

        let interval = self.shared.config.tick_interval;
        let active: Vec<Arc<dyn EntityStreamer>> = self
            .shared
            .streamers
            .read()
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();

        if active.is_empty() {
            self.suspend(interval).await;
            self.shared.passes.fetch_add(1, Ordering::Relaxed);
            return 0;
        }

        let slice = interval / u32::try_from(active.len()).unwrap_or(u32::MAX);
        let mut ticked = 0;

        for streamer in &active {
            if self.state() == SchedulerState::Disposed {
                break;
            }

            let started = Instant::now();
            self.tick_one(streamer.as_ref());
            ticked += 1;

            let elapsed = started.elapsed();
            if elapsed > slice {
                warn!(
                    class = streamer.class(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = slice.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }

            self.suspend(slice).await;
        }

        self.shared.passes.fetch_add(1, Ordering::Relaxed);
        ticked
    }

    fn tick_one(&self, streamer: &dyn EntityStreamer) {
        let observers = self.shared.observers.observers();
        let class = streamer.class();

        match panic::catch_unwind(AssertUnwindSafe(|| streamer.tick(&observers))) {
            Ok(Ok(delta)) => {
                if !delta.failed.is_empty() {
                    warn!(class, failed = delta.failed.len(), "engine rejected part of the tick");
                }
                debug!(
                    class,
                    observers = observers.len(),
                    visible = delta.visible.len(),
                    created = delta.to_create.len(),
                    destroyed = delta.to_destroy.len(),
                    "tick complete"
                );
            }
            Ok(Err(e)) => {
                let failures = self.record_failure(class);
                warn!(class, failures, error = %e, "tick failed");
            }
            Err(payload) => {
                let failures = self.record_failure(class);
                error!(class, failures, panic = panic_message(payload.as_ref()), "tick panicked");
            }
        }
    }

    fn record_failure(&self, class: &str) -> u64 {
        let mut count = self.shared.failures.entry(class.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    async fn suspend(&self, duration: Duration) {
        if self.state() == SchedulerState::Disposed {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = self.shared.wake.notified() => {}
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .field("classes", &self.allocator_count())
            .field("passes", &self.pass_count())
            .finish_non_exhaustive()
    }
}
