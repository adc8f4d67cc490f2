//! Analysis configuration for experiment log parsing.
//!
//! The epoch window and per-epoch capacity are passed explicitly into the
//! parse entry points rather than living in module-level constants, so two
//! runs with different windows can coexist in one process.

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("epoch window is empty: low {low} >= high {high}")]
    EmptyWindow { low: usize, high: usize },

    #[error("epoch window end {high} exceeds per-epoch capacity {capacity}")]
    WindowBeyondCapacity { high: usize, capacity: usize },

    #[error("per-epoch capacity must be non-zero")]
    ZeroCapacity,
}

/// Configuration for a single analysis run.
///
/// The analysis window `[epoch_low, epoch_high)` selects the epochs that
/// survive compaction; `epoch_capacity` bounds the pre-sized per-epoch
/// arrays, and epoch indices at or beyond it are dropped during parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// First epoch (inclusive) of the analysis window
    pub epoch_low: usize,
    /// Last epoch (exclusive) of the analysis window
    pub epoch_high: usize,
    /// Capacity of the pre-sized per-epoch arrays
    pub epoch_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            epoch_low: 0,
            epoch_high: 100,
            epoch_capacity: 200,
        }
    }
}

impl AnalysisConfig {
    /// Number of epochs in the analysis window
    pub fn window_len(&self) -> usize {
        self.epoch_high.saturating_sub(self.epoch_low)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.epoch_low >= self.epoch_high {
            return Err(ConfigError::EmptyWindow {
                low: self.epoch_low,
                high: self.epoch_high,
            });
        }
        if self.epoch_high > self.epoch_capacity {
            return Err(ConfigError::WindowBeyondCapacity {
                high: self.epoch_high,
                capacity: self.epoch_capacity,
            });
        }
        Ok(())
    }
}
