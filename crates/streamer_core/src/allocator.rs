//! Visibility allocator: per-tick admission for one entity class.
//!
//! The allocator owns the registry entries of its class: each registered
//! descriptor paired with the live handle the world engine gave it, if any.
//! Every tick it:
//!
//! 1. Splits the global quota evenly between observers
//!    (`share = floor(quota / observers)`).
//! 2. For each observer, ranks the descriptors within `max_distance` by
//!    `(planar distance², id)` and accepts the nearest `share` of them.
//! 3. Takes the union as the visible set, creates what is visible but not
//!    live, and destroys what is live but no longer visible, unless the
//!    liveness registry has it pinned.
//!
//! Flooring the share keeps the global cap hard: when observers outnumber the
//! quota every share is zero and nothing new becomes visible.
//!
//! `stream` holds the allocator lock for its whole run, so it always sees a
//! consistent snapshot. An `add` or `delete` issued meanwhile waits for the
//! tick to finish and is picked up by the next one.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use streamer_entity::{DescriptorId, EntityDescriptor, LiveHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{GridConfig, StreamLimits};
use crate::engine::{EngineError, WorldEngine};
use crate::error::StreamError;
use crate::grid::SpatialGrid;
use crate::liveness::LivenessRegistry;
use crate::observer::{Observer, ObserverId};
use crate::scheduler::EntityStreamer;

/// Outcome of one admission pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    /// Every descriptor admitted this tick.
    pub visible: BTreeSet<DescriptorId>,
    /// How many descriptors each observer accepted, in observer order.
    pub per_observer: Vec<(ObserverId, usize)>,
    /// Descriptors materialized this tick.
    pub to_create: Vec<DescriptorId>,
    /// Descriptors torn down this tick.
    pub to_destroy: Vec<DescriptorId>,
    /// Descriptors whose create or destroy the engine rejected. A rejected
    /// destroy still drops the handle; a rejected create is retried next tick.
    pub failed: Vec<DescriptorId>,
}

impl StreamDelta {
    /// Returns `true` if the tick changed nothing in the world and
    /// nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_destroy.is_empty() && self.failed.is_empty()
    }
}

/// A registered descriptor and its live handle.
#[derive(Debug)]
struct Entry {
    descriptor: Arc<EntityDescriptor>,
    handle: Option<LiveHandle>,
}

#[derive(Debug)]
struct State {
    entries: HashMap<DescriptorId, Entry>,
    handles: HashMap<LiveHandle, DescriptorId>,
    grid: SpatialGrid,
}

impl State {
    /// Drop the live handle of `id` and ask the engine to destroy it.
    ///
    /// The handle is forgotten even if the engine rejects the call: a handle
    /// the engine no longer knows cannot be destroyed later either.
    fn destroy(
        &mut self,
        engine: &dyn WorldEngine,
        id: DescriptorId,
    ) -> Option<Result<LiveHandle, EngineError>> {
        let handle = self.entries.get_mut(&id)?.handle.take()?;
        self.handles.remove(&handle);
        Some(engine.destroy(handle).map(|()| handle))
    }

    fn create(&mut self, engine: &dyn WorldEngine, id: DescriptorId) -> Result<(), EngineError> {
        let Some(entry) = self.entries.get_mut(&id) else {
            return Ok(());
        };
        if entry.handle.is_some() {
            return Ok(());
        }
        let handle = engine.create(&entry.descriptor)?;
        entry.handle = Some(handle);
        self.handles.insert(handle, id);
        Ok(())
    }

    /// Rank and admit descriptors for every observer.
    fn admit(
        &self,
        observers: &[Observer],
        limits: StreamLimits,
    ) -> (BTreeSet<DescriptorId>, Vec<(ObserverId, usize)>) {
        let share = limits.max_visible_per_tick / observers.len();
        let max_distance_sq = limits.max_distance * limits.max_distance;

        let mut visible = BTreeSet::new();
        let mut per_observer = Vec::with_capacity(observers.len());
        let mut candidates = Vec::new();
        let mut ranked: Vec<(f32, DescriptorId)> = Vec::new();

        for observer in observers {
            if share == 0 {
                per_observer.push((observer.id, 0));
                continue;
            }

            candidates.clear();
            ranked.clear();
            self.grid
                .candidates(observer.position, limits.max_distance, &mut candidates);

            for id in &candidates {
                let Some(entry) = self.entries.get(id) else {
                    continue;
                };
                let distance_sq = entry
                    .descriptor
                    .placement()
                    .planar_distance_squared(observer.position);
                if distance_sq <= max_distance_sq {
                    ranked.push((distance_sq, *id));
                }
            }

            if ranked.len() > share {
                ranked.select_nth_unstable_by(share - 1, |a, b| {
                    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
                });
                ranked.truncate(share);
            }

            per_observer.push((observer.id, ranked.len()));
            visible.extend(ranked.iter().map(|(_, id)| *id));
        }

        (visible, per_observer)
    }
}

/// Streams one entity class against the world engine.
pub struct VisibilityAllocator {
    class: String,
    limits: StreamLimits,
    engine: Arc<dyn WorldEngine>,
    liveness: Arc<LivenessRegistry>,
    /// `None` once disposed.
    state: Mutex<Option<State>>,
}

impl VisibilityAllocator {
    /// Create an allocator with the default grid.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfiguration`] for invalid limits.
    pub fn new(
        class: impl Into<String>,
        limits: StreamLimits,
        engine: Arc<dyn WorldEngine>,
    ) -> Result<Self, StreamError> {
        Self::with_grid(class, limits, GridConfig::default(), engine)
    }

    /// Create an allocator with an explicit grid configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfiguration`] for invalid limits or
    /// cell size.
    pub fn with_grid(
        class: impl Into<String>,
        limits: StreamLimits,
        grid: GridConfig,
        engine: Arc<dyn WorldEngine>,
    ) -> Result<Self, StreamError> {
        limits.validate()?;
        grid.validate()?;
        let class = class.into();
        info!(
            class,
            max_visible = limits.max_visible_per_tick,
            max_distance = limits.max_distance,
            cell_size = grid.cell_size,
            "visibility allocator created"
        );
        Ok(Self {
            class,
            limits,
            engine,
            liveness: Arc::new(LivenessRegistry::new()),
            state: Mutex::new(Some(State {
                entries: HashMap::new(),
                handles: HashMap::new(),
                grid: SpatialGrid::new(grid.cell_size),
            })),
        })
    }

    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut State) -> Result<R, StreamError>,
    ) -> Result<R, StreamError> {
        let mut guard = self.state.lock();
        let state = guard
            .as_mut()
            .ok_or(StreamError::Disposed("visibility allocator"))?;
        f(state)
    }

    /// The entity class this allocator streams.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The limits used by scheduled ticks.
    #[must_use]
    pub fn limits(&self) -> StreamLimits {
        self.limits
    }

    /// The liveness registry consulted before every destroy decision.
    #[must_use]
    pub fn liveness(&self) -> &Arc<LivenessRegistry> {
        &self.liveness
    }

    /// Register a descriptor. It is considered from the next tick on.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlreadyRegistered`] if the same descriptor is
    /// already registered, or [`StreamError::Disposed`].
    pub fn add(&self, descriptor: Arc<EntityDescriptor>) -> Result<(), StreamError> {
        self.with_state(|state| {
            let id = descriptor.id();
            if state.entries.contains_key(&id) {
                return Err(StreamError::AlreadyRegistered(id));
            }
            state.grid.insert(id, descriptor.placement().position);
            state.entries.insert(
                id,
                Entry {
                    descriptor,
                    handle: None,
                },
            );
            Ok(())
        })
    }

    /// Unregister a descriptor, destroying its live entity if it has one and
    /// dropping its pin and respawn bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::UnknownEntity`] if it is not registered,
    /// [`StreamError::EngineFailure`] if the live entity could not be
    /// destroyed (the descriptor is unregistered regardless), or
    /// [`StreamError::Disposed`].
    pub fn delete(&self, id: DescriptorId) -> Result<(), StreamError> {
        self.with_state(|state| {
            if !state.entries.contains_key(&id) {
                return Err(StreamError::UnknownEntity(id));
            }
            self.liveness.forget(id)?;
            let entry = state
                .entries
                .remove(&id)
                .ok_or(StreamError::UnknownEntity(id))?;
            state.grid.remove(id);
            if let Some(handle) = entry.handle {
                state.handles.remove(&handle);
                self.engine.destroy(handle)?;
            }
            Ok(())
        })
    }

    /// Number of registered descriptors. Zero once disposed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().as_ref().map_or(0, |s| s.entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered descriptors that are currently materialized.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().as_ref().map_or(0, |s| s.handles.len())
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: DescriptorId) -> bool {
        self.state
            .lock()
            .as_ref()
            .is_some_and(|s| s.entries.contains_key(&id))
    }

    /// The live handle of a registered descriptor, if materialized.
    #[must_use]
    pub fn handle_of(&self, id: DescriptorId) -> Option<LiveHandle> {
        self.state
            .lock()
            .as_ref()
            .and_then(|s| s.entries.get(&id))
            .and_then(|e| e.handle)
    }

    /// The registered descriptor that owns `handle`.
    #[must_use]
    pub fn resolve(&self, handle: LiveHandle) -> Option<Arc<EntityDescriptor>> {
        let guard = self.state.lock();
        let state = guard.as_ref()?;
        let id = state.handles.get(&handle)?;
        state.entries.get(id).map(|e| Arc::clone(&e.descriptor))
    }

    /// Forget a handle the world engine already tore down on its own. No
    /// engine call is made; the descriptor stays registered.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::UnknownHandle`] if no descriptor owns `handle`,
    /// or [`StreamError::Disposed`].
    pub fn release(&self, handle: LiveHandle) -> Result<Arc<EntityDescriptor>, StreamError> {
        self.with_state(|state| {
            let id = state
                .handles
                .remove(&handle)
                .ok_or(StreamError::UnknownHandle(handle))?;
            let entry = state
                .entries
                .get_mut(&id)
                .ok_or(StreamError::UnknownHandle(handle))?;
            entry.handle = None;
            Ok(Arc::clone(&entry.descriptor))
        })
    }

    /// Administrative override: tear the live entity down now. If it is still
    /// visible the next tick materializes it again at its original placement.
    ///
    /// Returns `false` if the descriptor was not live.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::UnknownEntity`], [`StreamError::Disposed`], or
    /// [`StreamError::EngineFailure`] if the engine rejected the destroy (the
    /// handle is dropped regardless).
    pub fn force_respawn(&self, id: DescriptorId) -> Result<bool, StreamError> {
        self.with_state(|state| {
            if !state.entries.contains_key(&id) {
                return Err(StreamError::UnknownEntity(id));
            }
            match state.destroy(self.engine.as_ref(), id) {
                Some(result) => result.map(|_| true).map_err(StreamError::from),
                None => Ok(false),
            }
        })
    }

    /// Respawn every descriptor the liveness registry reports due at `now`.
    ///
    /// Returns how many live handles were dropped for respawn. An engine
    /// rejection is logged and the handle dropped anyway, so the next stream
    /// rematerializes the descriptor either way.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disposed`].
    pub fn respawn_due(&self, now: Instant) -> Result<usize, StreamError> {
        self.with_state(|state| {
            let due = self.liveness.due_for_respawn(now)?;
            let mut respawned = 0;
            for id in due {
                match state.destroy(self.engine.as_ref(), id) {
                    Some(Ok(_)) => respawned += 1,
                    Some(Err(e)) => {
                        respawned += 1;
                        warn!(class = self.class, descriptor = %id, error = %e, "destroy for respawn failed");
                    }
                    None => {}
                }
            }
            if respawned > 0 {
                debug!(class = self.class, respawned, "respawned vacant entities");
            }
            Ok(respawned)
        })
    }

    /// Rebuild the spatial index. Has no effect on results.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disposed`].
    pub fn optimise(&self) -> Result<(), StreamError> {
        self.with_state(|state| {
            let positions: Vec<_> = state
                .entries
                .iter()
                .map(|(id, e)| (*id, e.descriptor.placement().position))
                .collect();
            state.grid.rebuild(positions);
            debug!(
                class = self.class,
                cells = state.grid.occupied_cells(),
                "spatial index rebuilt"
            );
            Ok(())
        })
    }

    /// Run one admission pass and apply it to the world engine.
    ///
    /// With no observers nothing is created or destroyed.
    ///
    /// Engine rejections never abort the pass: each one is logged, listed in
    /// [`StreamDelta::failed`], and the remaining descriptors are still
    /// applied. `to_create` and `to_destroy` list only what succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfiguration`] if `max_visible_per_tick`
    /// is zero or `max_distance` is not a positive finite number, or
    /// [`StreamError::Disposed`].
    pub fn stream(
        &self,
        observers: &[Observer],
        max_visible_per_tick: usize,
        max_distance: f32,
    ) -> Result<StreamDelta, StreamError> {
        let limits = StreamLimits::new(max_visible_per_tick, max_distance)?;

        self.with_state(|state| {
            if observers.is_empty() {
                return Ok(StreamDelta::default());
            }

            let pinned = self.liveness.pinned()?;
            let (visible, per_observer) = state.admit(observers, limits);

            let mut to_destroy: Vec<DescriptorId> = state
                .entries
                .iter()
                .filter(|(id, e)| {
                    e.handle.is_some() && !visible.contains(*id) && !pinned.contains(*id)
                })
                .map(|(id, _)| *id)
                .collect();
            to_destroy.sort_unstable();

            let mut to_create: Vec<DescriptorId> = visible
                .iter()
                .filter(|id| state.entries.get(*id).is_some_and(|e| e.handle.is_none()))
                .copied()
                .collect();

            let mut failed = Vec::new();
            to_destroy.retain(|id| match state.destroy(self.engine.as_ref(), *id) {
                Some(Err(e)) => {
                    warn!(class = self.class, descriptor = %id, error = %e, "destroy failed, handle dropped");
                    failed.push(*id);
                    false
                }
                _ => true,
            });
            to_create.retain(|id| match state.create(self.engine.as_ref(), *id) {
                Ok(()) => true,
                Err(e) => {
                    warn!(class = self.class, descriptor = %id, error = %e, "create failed");
                    failed.push(*id);
                    false
                }
            });

            debug!(
                class = self.class,
                observers = observers.len(),
                visible = visible.len(),
                created = to_create.len(),
                destroyed = to_destroy.len(),
                failed = failed.len(),
                "streamed"
            );

            Ok(StreamDelta {
                visible,
                per_observer,
                to_create,
                to_destroy,
                failed,
            })
        })
    }

    /// Destroy every live entity and release all indices. Later calls fail
    /// with [`StreamError::Disposed`]. Disposing twice is a no-op.
    pub fn dispose(&self) {
        let Some(state) = self.state.lock().take() else {
            return;
        };
        let mut destroyed = 0usize;
        for handle in state.handles.keys() {
            match self.engine.destroy(*handle) {
                Ok(()) => destroyed += 1,
                Err(e) => warn!(class = self.class, %handle, error = %e, "destroy failed during dispose"),
            }
        }
        self.liveness.dispose();
        info!(
            class = self.class,
            descriptors = state.entries.len(),
            destroyed,
            "visibility allocator disposed"
        );
    }
}

impl fmt::Debug for VisibilityAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityAllocator")
            .field("class", &self.class)
            .field("limits", &self.limits)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl EntityStreamer for VisibilityAllocator {
    fn class(&self) -> &str {
        &self.class
    }

    fn len(&self) -> usize {
        VisibilityAllocator::len(self)
    }

    fn tick(&self, observers: &[Observer]) -> Result<StreamDelta, StreamError> {
        self.respawn_due(Instant::now())?;
        self.stream(
            observers,
            self.limits.max_visible_per_tick,
            self.limits.max_distance,
        )
    }
}
