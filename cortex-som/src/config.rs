//! Configuration for feature extraction, streaming and SOM training

use crate::error::{CortexError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration. Fixed once the pipeline is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CortexConfig {
    /// Map and training schedule
    pub som: SomConfig,

    /// Chunking and band layout
    pub features: FeatureConfig,

    /// Capture/processing buffer
    pub stream: StreamConfig,

    /// Number of recent feature vectors carried in each snapshot
    pub history_capacity: usize,
}

/// Self-organizing map configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SomConfig {
    /// Grid rows (R)
    pub rows: usize,

    /// Grid columns (C)
    pub cols: usize,

    /// Weight vector length (D)
    pub dim: usize,

    /// Learning rate at step 0
    pub initial_learning_rate: f64,

    /// Learning rate the schedule converges to
    pub min_learning_rate: f64,

    /// Learning rate time constant, in steps
    pub learning_rate_decay: f64,

    /// Neighborhood radius at step 0, in grid cells
    pub initial_radius: f64,

    /// Radius the schedule converges to
    pub min_radius: f64,

    /// Radius time constant, in steps
    pub radius_decay: f64,

    /// Seed for initial weights
    pub seed: u64,
}

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Sample rate (Hz)
    pub sample_rate: u32,

    /// Samples per chunk
    pub chunk_size: usize,

    /// Low band, `[lo, hi)` in Hz
    pub low_band: (f64, f64),

    /// Mid band, `[lo, hi)` in Hz
    pub mid_band: (f64, f64),
}

/// Stream buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum queued chunks before the oldest is dropped
    pub buffer_capacity: usize,

    /// Upper bound on a single consumer wait
    pub pop_timeout_ms: u64,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            som: SomConfig::default(),
            features: FeatureConfig::default(),
            stream: StreamConfig::default(),
            history_capacity: 512,
        }
    }
}

impl Default for SomConfig {
    fn default() -> Self {
        Self {
            rows: 20,
            cols: 20,
            dim: 3,
            initial_learning_rate: 0.5,
            min_learning_rate: 0.01,
            learning_rate_decay: 1000.0,
            initial_radius: 3.0,
            min_radius: 0.5,
            radius_decay: 1000.0,
            seed: 42,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            chunk_size: 2048,
            low_band: (50.0, 200.0),
            mid_band: (800.0, 3200.0),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            // ~1.5 s of audio at 44.1 kHz / 2048 samples per chunk
            buffer_capacity: 32,
            pop_timeout_ms: 50,
        }
    }
}

impl CortexConfig {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.som.validate()?;
        self.features.validate()?;
        self.stream.validate()?;

        if self.history_capacity == 0 {
            return Err("History capacity must be greater than 0".to_string());
        }

        if self.history_capacity > 1_000_000 {
            return Err("History capacity too large (max 1000000)".to_string());
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CortexConfig = toml::from_str(text)
            .map_err(|e| CortexError::Config(format!("Invalid TOML: {}", e)))?;
        config.validate().map_err(CortexError::Config)?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CortexError::Serialization(e.to_string()))
    }
}

impl SomConfig {
    /// Validate map configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.rows == 0 || self.cols == 0 {
            return Err("Grid dimensions must be greater than 0".to_string());
        }

        if self.rows.saturating_mul(self.cols) > 1 << 20 {
            return Err("Grid too large (max 1048576 neurons)".to_string());
        }

        if self.dim == 0 {
            return Err("Weight dimensionality must be greater than 0".to_string());
        }

        validate_schedule(
            "learning rate",
            self.initial_learning_rate,
            self.min_learning_rate,
            self.learning_rate_decay,
        )?;

        if self.initial_learning_rate > 1.0 {
            return Err("Initial learning rate must not exceed 1.0".to_string());
        }

        validate_schedule("radius", self.initial_radius, self.min_radius, self.radius_decay)?;

        Ok(())
    }
}

pub(crate) fn validate_schedule(
    name: &str,
    initial: f64,
    floor: f64,
    decay: f64,
) -> std::result::Result<(), String> {
    if !initial.is_finite() || !floor.is_finite() || !decay.is_finite() {
        return Err(format!("Non-finite {} schedule", name));
    }

    if floor <= 0.0 {
        return Err(format!("Minimum {} must be greater than 0", name));
    }

    if initial < floor {
        return Err(format!("Initial {} must be at least the minimum", name));
    }

    if decay <= 0.0 {
        return Err(format!("{} decay must be greater than 0", name));
    }

    Ok(())
}

impl FeatureConfig {
    /// Validate band layout against the sample rate
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.sample_rate == 0 {
            return Err("Sample rate must be greater than 0".to_string());
        }

        if self.sample_rate > 192000 {
            return Err("Sample rate too high (max 192000 Hz)".to_string());
        }

        if self.chunk_size < 2 {
            return Err("Chunk size must be at least 2 samples".to_string());
        }

        if self.chunk_size > 65536 {
            return Err("Chunk size too large (max 65536)".to_string());
        }

        let nyquist = self.sample_rate as f64 / 2.0;
        for (name, (lo, hi)) in [("low", self.low_band), ("mid", self.mid_band)] {
            if !lo.is_finite() || !hi.is_finite() || lo < 0.0 || hi <= lo {
                return Err(format!("Invalid {} band: [{}, {})", name, lo, hi));
            }
            if hi > nyquist {
                return Err(format!(
                    "{} band upper edge {} Hz exceeds Nyquist ({} Hz)",
                    name, hi, nyquist
                ));
            }
        }

        let (low, mid) = (self.low_band, self.mid_band);
        if low.0 < mid.1 && mid.0 < low.1 {
            return Err("Frequency bands must not overlap".to_string());
        }

        Ok(())
    }
}

impl StreamConfig {
    /// Validate buffer configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.buffer_capacity == 0 {
            return Err("Buffer capacity must be greater than 0".to_string());
        }

        if self.buffer_capacity > 65536 {
            return Err("Buffer capacity too large (max 65536)".to_string());
        }

        if self.pop_timeout_ms == 0 {
            return Err("Pop timeout must be greater than 0".to_string());
        }

        if self.pop_timeout_ms > 10000 {
            return Err("Pop timeout too large (max 10000 ms)".to_string());
        }

        Ok(())
    }
}
