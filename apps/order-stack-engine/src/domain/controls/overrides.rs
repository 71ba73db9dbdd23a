//! Per-(instrument, strategy) trading overrides.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading restriction on an (instrument, strategy) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Override {
    /// Trade normally.
    #[default]
    None,
    /// Only trades that close the position.
    Close,
    /// Only trades that reduce the position.
    ReduceOnly,
    /// A stop-loss has fired; no position-increasing trades until the delay
    /// days run out.
    StopLossOverride,
}

impl Override {
    /// True when set by a stop-loss fill.
    #[must_use]
    pub const fn is_stop_loss(self) -> bool {
        matches!(self, Self::StopLossOverride)
    }

    /// True when trades may add to the position.
    #[must_use]
    pub const fn allows_position_increase(self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "NONE",
            Self::Close => "CLOSE",
            Self::ReduceOnly => "REDUCE_ONLY",
            Self::StopLossOverride => "STOP_LOSS_OVERRIDE",
        };
        write!(f, "{s}")
    }
}
