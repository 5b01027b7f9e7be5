//! Server configuration.
//!
//! Loaded from a JSON file given with `--config`; every field has a default,
//! so an empty object (or no file at all) yields a working server.
//!
//! ```json
//! {
//!   "tick_interval_ms": 500,
//!   "classes": [
//!     { "class": "vehicle", "max_visible_per_tick": 1000, "max_distance": 300.0 }
//!   ],
//!   "placements": [
//!     {
//!       "kind": { "class": "vehicle", "model": 411 },
//!       "placement": { "position": [1520.0, -1740.0, 13.5] },
//!       "respawn_delay": 120.0
//!     }
//!   ]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use streamer_core::config::{DEFAULT_CELL_SIZE, DEFAULT_TICK_INTERVAL};
use streamer_core::{GridConfig, SchedulerConfig, StreamLimits};
use streamer_entity::DescriptorSpec;

/// Limits for one entity class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Class name, matching the `class` tag of placements (e.g. `"vehicle"`).
    pub class: String,
    pub max_visible_per_tick: usize,
    pub max_distance: f32,
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
}

impl ClassConfig {
    fn new(class: &str, max_visible_per_tick: usize, max_distance: f32) -> Self {
        Self {
            class: class.to_string(),
            max_visible_per_tick,
            max_distance,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }

    /// Validated admission limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the quota or distance is not positive.
    pub fn limits(&self) -> Result<StreamLimits> {
        StreamLimits::new(self.max_visible_per_tick, self.max_distance)
            .with_context(|| format!("class {:?}", self.class))
    }

    #[must_use]
    pub fn grid(&self) -> GridConfig {
        GridConfig::default().with_cell_size(self.cell_size)
    }
}

fn default_cell_size() -> f32 {
    DEFAULT_CELL_SIZE
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}

fn default_classes() -> Vec<ClassConfig> {
    vec![
        ClassConfig::new("vehicle", 1000, 300.0),
        ClassConfig::new("prop", 1000, 300.0),
        ClassConfig::new("pickup", 4096, 200.0),
        ClassConfig::new("label", 1024, 100.0),
    ]
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_classes")]
    pub classes: Vec<ClassConfig>,
    /// Descriptors registered at startup.
    #[serde(default)]
    pub placements: Vec<DescriptorSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            classes: default_classes(),
            placements: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Read and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// [`AppConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Parse and validate configuration JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or invalid values.
    pub fn parse(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every class has valid limits and appears once.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.scheduler()?;
        for (i, class) in self.classes.iter().enumerate() {
            class.limits()?;
            class.grid().validate()?;
            if self.classes[..i].iter().any(|c| c.class == class.class) {
                bail!("class {:?} is configured twice", class.class);
            }
        }
        Ok(())
    }

    /// Scheduler settings.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero tick interval.
    pub fn scheduler(&self) -> Result<SchedulerConfig> {
        let config = SchedulerConfig::default()
            .with_tick_interval(Duration::from_millis(self.tick_interval_ms));
        config.validate()?;
        Ok(config)
    }
}
