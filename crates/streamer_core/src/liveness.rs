//! Liveness registry: pins and respawn timing.
//!
//! A pinned descriptor is in active use (someone is sitting in the vehicle)
//! and must stay materialized whatever the visibility computation says. When
//! the last user leaves, the descriptor is unpinned and starts standing
//! vacant; once it has stood vacant longer than its respawn delay it becomes
//! due for a forced respawn at its original placement.
//!
//! One registry serves one entity class. The registry never touches live
//! handles; the allocator consults it before every destroy decision and
//! drains due respawns at the start of every tick.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use streamer_entity::{DescriptorId, EntityDescriptor};
use tokio::time::Instant;
use tracing::debug;

use crate::error::StreamError;
use crate::queue::EligibilityQueue;

/// Last-activity record of a tracked descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vacancy {
    /// When the descriptor was last pinned or unpinned.
    pub since: Instant,
    /// `since` plus the descriptor's respawn delay, or `None` when that
    /// instant is past what the clock can represent. Such a descriptor is
    /// never due.
    pub due_at: Option<Instant>,
}

/// Earliest due first; never-due vacancies sort last.
fn by_due_at(a: &Vacancy, b: &Vacancy) -> std::cmp::Ordering {
    match (a.due_at, b.due_at) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

#[derive(Debug)]
struct Inner {
    pinned: HashSet<DescriptorId>,
    delays: HashMap<DescriptorId, Duration>,
    queue: EligibilityQueue<DescriptorId, Vacancy>,
}

impl Inner {
    fn new() -> Self {
        Self {
            pinned: HashSet::new(),
            delays: HashMap::new(),
            queue: EligibilityQueue::new(by_due_at),
        }
    }

    fn refresh(&mut self, id: DescriptorId, delay: Duration, now: Instant) {
        self.queue.push(
            id,
            Vacancy {
                since: now,
                due_at: now.checked_add(delay),
            },
        );
    }
}

/// Tracks pinned descriptors and when vacated ones are due for respawn.
#[derive(Debug)]
pub struct LivenessRegistry {
    /// `None` once disposed.
    inner: Mutex<Option<Inner>>,
}

impl LivenessRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Some(Inner::new())),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, StreamError> {
        let mut guard = self.inner.lock();
        let inner = guard
            .as_mut()
            .ok_or(StreamError::Disposed("liveness registry"))?;
        Ok(f(inner))
    }

    /// Mark `descriptor` as in use at `now`.
    ///
    /// Pinning an already pinned descriptor refreshes its activity time.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NotPersistent`] for descriptors without a
    /// respawn delay, or [`StreamError::Disposed`].
    pub fn pin(&self, descriptor: &EntityDescriptor, now: Instant) -> Result<(), StreamError> {
        let id = descriptor.id();
        let delay = descriptor
            .respawn_delay()
            .ok_or(StreamError::NotPersistent(id))?;

        self.with(|inner| {
            let refreshed = !inner.pinned.insert(id);
            inner.delays.insert(id, delay);
            inner.refresh(id, delay, now);
            debug!(descriptor = %id, refreshed, "pinned");
        })
    }

    /// Release the pin on `id` at `now`.
    ///
    /// The live entity is left alone: the descriptor simply rejoins normal
    /// visibility computation and starts its vacancy countdown.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::UnknownEntity`] if `id` is not pinned (nothing
    /// changes in that case), or [`StreamError::Disposed`].
    pub fn unpin(&self, id: DescriptorId, now: Instant) -> Result<(), StreamError> {
        self.with(|inner| {
            if !inner.pinned.remove(&id) {
                return Err(StreamError::UnknownEntity(id));
            }
            let delay = inner
                .delays
                .get(&id)
                .copied()
                .ok_or(StreamError::UnknownEntity(id))?;
            inner.refresh(id, delay, now);
            debug!(descriptor = %id, vacant_for = ?delay, "unpinned");
            Ok(())
        })?
    }

    /// Returns `true` if `id` is currently pinned.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disposed`].
    pub fn is_pinned(&self, id: DescriptorId) -> Result<bool, StreamError> {
        self.with(|inner| inner.pinned.contains(&id))
    }

    /// Snapshot of every pinned id.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disposed`].
    pub fn pinned(&self) -> Result<HashSet<DescriptorId>, StreamError> {
        self.with(|inner| inner.pinned.clone())
    }

    /// The vacancy record of a tracked descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disposed`].
    pub fn vacancy(&self, id: DescriptorId) -> Result<Option<Vacancy>, StreamError> {
        self.with(|inner| inner.queue.get(&id).copied())
    }

    /// Number of descriptors tracked for respawn, pinned or not.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, |inner| inner.queue.len())
    }

    /// Stop tracking `id` entirely. Returns `false` if it was not tracked.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disposed`].
    pub fn forget(&self, id: DescriptorId) -> Result<bool, StreamError> {
        self.with(|inner| {
            let was_pinned = inner.pinned.remove(&id);
            inner.delays.remove(&id);
            inner.queue.delete(&id).is_some() || was_pinned
        })
    }

    /// Drain every unpinned descriptor whose vacancy has outlasted its
    /// respawn delay, earliest due first.
    ///
    /// Pinned descriptors are never returned and stay queued.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disposed`].
    pub fn due_for_respawn(&self, now: Instant) -> Result<Vec<DescriptorId>, StreamError> {
        self.with(|inner| {
            let mut due = Vec::new();
            for (id, vacancy) in inner.queue.iter() {
                match vacancy.due_at {
                    Some(due_at) if due_at < now => {}
                    _ => break,
                }
                if !inner.pinned.contains(id) {
                    due.push(*id);
                }
            }
            for id in &due {
                inner.queue.delete(id);
                inner.delays.remove(id);
            }
            due
        })
    }

    /// Release all bookkeeping. Later calls fail with [`StreamError::Disposed`].
    pub fn dispose(&self) {
        self.inner.lock().take();
    }
}

impl Default for LivenessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
