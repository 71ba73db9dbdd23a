//! Stop-loss instructions carried by contract orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do about stop-loss protection once a contract order fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachStopLoss {
    /// Create a new stop-loss sized to the fill.
    NewOrder,
    /// Resize the existing stop-loss by `change_order_by`.
    ChangeExistingOrder,
    /// Leave stop-loss protection alone.
    #[default]
    NoStopLoss,
}

impl fmt::Display for AttachStopLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NewOrder => "NEW_ORDER",
            Self::ChangeExistingOrder => "CHANGE_EXISTING_ORDER",
            Self::NoStopLoss => "NO_STOP_LOSS",
        };
        write!(f, "{s}")
    }
}

/// Stop-loss parameters for one contract order.
///
/// `stop_loss_level` and `delay_days` may be unset until resolved from
/// configuration just before a stop-loss is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StopLossInfo {
    /// Requested action.
    pub attach_stop_loss: AttachStopLoss,
    /// Fractional price distance from the fill price, e.g. `0.05`.
    pub stop_loss_level: Option<Decimal>,
    /// Cooldown after the stop fires.
    pub delay_days: Option<u32>,
    /// Signed quantity delta for resizing an existing stop-loss.
    pub change_order_by: Option<i64>,
}

impl StopLossInfo {
    /// Attach a new stop-loss.
    #[must_use]
    pub const fn new_order(stop_loss_level: Option<Decimal>, delay_days: Option<u32>) -> Self {
        Self {
            attach_stop_loss: AttachStopLoss::NewOrder,
            stop_loss_level,
            delay_days,
            change_order_by: None,
        }
    }

    /// Resize the existing stop-loss.
    #[must_use]
    pub const fn change_existing_order(change_order_by: i64) -> Self {
        Self {
            attach_stop_loss: AttachStopLoss::ChangeExistingOrder,
            stop_loss_level: None,
            delay_days: None,
            change_order_by: Some(change_order_by),
        }
    }

    /// No stop-loss handling.
    #[must_use]
    pub fn no_stop_loss() -> Self {
        Self::default()
    }

    /// True when nothing is requested.
    #[must_use]
    pub fn is_no_stop_loss(&self) -> bool {
        self.attach_stop_loss == AttachStopLoss::NoStopLoss
    }

    /// True once both level and delay days are known.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.stop_loss_level.is_some() && self.delay_days.is_some()
    }

    /// Fill unset level and delay days from configured defaults.
    #[must_use]
    pub fn with_defaults(mut self, level: Option<Decimal>, delay_days: Option<u32>) -> Self {
        self.stop_loss_level = self.stop_loss_level.or(level);
        self.delay_days = self.delay_days.or(delay_days);
        self
    }
}
