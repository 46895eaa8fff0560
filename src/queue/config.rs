//! Watermark Queue Configuration
//!
//! Provides serializable configuration for watermark queues and trackers,
//! TOML load/save helpers and a handful of presets.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::watermarks::Watermarks;

/// Longest poll wait accepted from configuration (one day)
const MAX_WAIT_LIMIT_MS: u64 = 24 * 60 * 60 * 1000;

/// Main watermark configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Occupancy at which a suspended producer is resumed
    pub lower_watermark: usize,

    /// Occupancy at which the producer is suspended
    pub upper_watermark: usize,

    /// Longest time a poll waits on an empty queue (milliseconds)
    pub max_wait_ms: u64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            lower_watermark: 256,
            upper_watermark: 1024,
            max_wait_ms: 100,
        }
    }
}

impl WatermarkConfig {
    /// Check the configuration without building anything
    pub fn validate(&self) -> QueueResult<()> {
        Watermarks::new(self.lower_watermark, self.upper_watermark)?;

        if self.max_wait_ms > MAX_WAIT_LIMIT_MS {
            return Err(QueueError::invalid_config(format!(
                "max_wait_ms {} exceeds limit of {} ms",
                self.max_wait_ms, MAX_WAIT_LIMIT_MS
            )));
        }

        Ok(())
    }

    /// Validated watermark pair
    pub fn watermarks(&self) -> QueueResult<Watermarks> {
        Watermarks::new(self.lower_watermark, self.upper_watermark)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Watermark configuration preset
#[derive(Debug, Clone, Copy)]
pub enum WatermarkPreset {
    /// Tiny thresholds that make crossings easy to observe
    Development,
    /// Balanced configuration for normal use
    Balanced,
    /// Deep queue tolerating long producer bursts
    HighThroughput,
    /// Shallow queue, producers paused early
    LowLatency,
}

impl WatermarkPreset {
    /// Get watermark configuration for this preset
    pub fn config(self) -> WatermarkConfig {
        match self {
            WatermarkPreset::Development => WatermarkConfig {
                lower_watermark: 1,
                upper_watermark: 3,
                max_wait_ms: 1000,
            },

            WatermarkPreset::Balanced => WatermarkConfig::default(),

            WatermarkPreset::HighThroughput => WatermarkConfig {
                lower_watermark: 2000,
                upper_watermark: 8000,
                ..Default::default()
            },

            WatermarkPreset::LowLatency => WatermarkConfig {
                lower_watermark: 16,
                upper_watermark: 64,
                max_wait_ms: 10,
            },
        }
    }
}

/// Load watermark configuration from TOML string
pub fn load_watermark_config(toml_str: &str) -> Result<WatermarkConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Save watermark configuration to TOML string
pub fn save_watermark_config(config: &WatermarkConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}
