//! Position store port.

use async_trait::async_trait;

use super::errors::PortError;
use crate::domain::orders::ContractOrder;
use crate::domain::shared::{FuturesContract, TradeQuantity};

/// Contract- and instrument-level position records.
#[async_trait]
pub trait PositionStorePort: Send + Sync {
    /// Add a fill increment to the position of each contract the order trades.
    async fn apply_contract_position_delta(
        &self,
        order: &ContractOrder,
        delta: &TradeQuantity,
    ) -> Result<(), PortError>;

    /// Add a fill increment to the (instrument, strategy) position.
    async fn apply_instrument_position_delta(
        &self,
        order: &ContractOrder,
        delta: &TradeQuantity,
    ) -> Result<(), PortError>;

    /// Net position held in one contract.
    async fn current_position(&self, contract: &FuturesContract) -> Result<i64, PortError>;
}
