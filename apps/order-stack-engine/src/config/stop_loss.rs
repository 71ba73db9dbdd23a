//! Stop-loss configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catastrophic stop-loss defaults.
///
/// `catastrophic_level` and `delay_days_after_stop_loss` may be left out; they
/// are only required once a stop-loss actually needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLossConfig {
    /// Attach catastrophic stop-loss info to new contract orders.
    #[serde(default = "default_use_catastrophic")]
    pub use_catastrophic: bool,
    /// Fractional distance of the stop from the fill price.
    #[serde(default)]
    pub catastrophic_level: Option<Decimal>,
    /// Cooldown after a stop-loss fires.
    #[serde(default)]
    pub delay_days_after_stop_loss: Option<u32>,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            use_catastrophic: default_use_catastrophic(),
            catastrophic_level: None,
            delay_days_after_stop_loss: None,
        }
    }
}

const fn default_use_catastrophic() -> bool {
    true
}
