//! Trading controls port: instrument locks and trade limits.

use async_trait::async_trait;

use super::errors::PortError;
use crate::domain::shared::{InstrumentCode, InstrumentStrategy, TradeQuantity};

/// Administrative locks and per-(instrument, strategy) trade limits.
#[async_trait]
pub trait TradeControlsPort: Send + Sync {
    /// Whether trading in the instrument is administratively locked.
    async fn is_instrument_locked(&self, instrument: &InstrumentCode) -> Result<bool, PortError>;

    /// Largest total absolute quantity allowed for `proposed`.
    async fn what_trade_is_possible(
        &self,
        instrument_strategy: &InstrumentStrategy,
        proposed: &TradeQuantity,
    ) -> Result<u64, PortError>;
}
