//! Collector tuning.

use serde::{Deserialize, Serialize};

/// Allocation-budget settings for the collector.
///
/// Missing fields take their default when deserialized, so a host can load
/// a partial settings file.
///
/// # Examples
///
/// ```
/// use memory_manager::GcConfig;
///
/// let config = GcConfig::default().with_stress(true);
/// assert!(config.stress);
/// assert_eq!(config.growth_factor, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// `next_gc` before the first collection
    pub initial_threshold: usize,
    /// Multiplier applied to the live size after each collection
    pub growth_factor: usize,
    /// Lower bound for `next_gc` after a collection
    pub min_threshold: usize,
    /// Collect before every allocation
    pub stress: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 1024 * 1024,
            growth_factor: 2,
            min_threshold: 1024 * 1024,
            stress: false,
        }
    }
}

impl GcConfig {
    /// Sets the first collection threshold
    pub fn with_initial_threshold(mut self, bytes: usize) -> Self {
        self.initial_threshold = bytes;
        self
    }

    /// Sets the post-collection growth factor
    pub fn with_growth_factor(mut self, factor: usize) -> Self {
        self.growth_factor = factor.max(1);
        self
    }

    /// Sets the lower bound of the post-collection threshold
    pub fn with_min_threshold(mut self, bytes: usize) -> Self {
        self.min_threshold = bytes;
        self
    }

    /// Enables or disables stress collection
    pub fn with_stress(mut self, stress: bool) -> Self {
        self.stress = stress;
        self
    }
}
