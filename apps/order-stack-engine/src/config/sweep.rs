//! Sweep scheduling configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often the stacks are swept and how shutdown cleans up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Interval between regular sweeps in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Run safe stack removal when the process shuts down.
    #[serde(default = "default_true")]
    pub safe_removal_on_shutdown: bool,
    /// Treat unfilled stop-losses as complete during safe removal.
    ///
    /// Off by default so that resting stops survive overnight.
    #[serde(default)]
    pub stop_loss_safe_removal_allow_zero: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            safe_removal_on_shutdown: true,
            stop_loss_safe_removal_allow_zero: false,
        }
    }
}

impl SweepConfig {
    /// Interval as a `Duration`.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

const fn default_interval_ms() -> u64 {
    1000
}

const fn default_true() -> bool {
    true
}
