//! Streaming configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Default spacing of the spatial grid, in world units.
pub const DEFAULT_CELL_SIZE: f32 = 200.0;

/// Default scheduler tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Per-class admission limits used on every scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamLimits {
    /// Global quota of visible descriptors per tick, shared by all observers.
    pub max_visible_per_tick: usize,
    /// Planar radius around an observer beyond which nothing is visible.
    pub max_distance: f32,
}

impl StreamLimits {
    /// Build validated limits.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfiguration`] if the quota is zero or
    /// the distance is not a positive finite number.
    pub fn new(max_visible_per_tick: usize, max_distance: f32) -> Result<Self, StreamError> {
        let limits = Self {
            max_visible_per_tick,
            max_distance,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// Check both limits are strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfiguration`] on a non-positive value.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.max_visible_per_tick == 0 {
            return Err(StreamError::InvalidConfiguration(
                "max_visible_per_tick must be greater than zero".to_string(),
            ));
        }
        if !self.max_distance.is_finite() || self.max_distance <= 0.0 {
            return Err(StreamError::InvalidConfiguration(format!(
                "max_distance must be a positive finite number, got {}",
                self.max_distance
            )));
        }
        Ok(())
    }
}

/// Spatial grid tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Edge length of one square grid cell, in world units.
    pub cell_size: f32,
}

impl GridConfig {
    /// Override the cell size.
    #[must_use]
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfiguration`] if the cell size is not a
    /// positive finite number.
    pub fn validate(&self) -> Result<(), StreamError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(StreamError::InvalidConfiguration(format!(
                "cell_size must be a positive finite number, got {}",
                self.cell_size
            )));
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

/// Configuration for the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time budget of one full pass over all non-empty allocators.
    pub tick_interval: Duration,
}

impl SchedulerConfig {
    /// Override the tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfiguration`] for a zero interval.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.tick_interval.is_zero() {
            return Err(StreamError::InvalidConfiguration(
                "tick_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}
