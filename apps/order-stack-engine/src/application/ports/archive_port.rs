//! Historic order archive port.

use async_trait::async_trait;

use super::errors::PortError;
use crate::domain::orders::{BrokerOrder, ContractOrder, InstrumentOrder};

/// Storage for retired order families.
#[async_trait]
pub trait HistoricOrderArchivePort: Send + Sync {
    /// Archive one family; stop-loss families have no instrument order.
    async fn add_historic_orders(
        &self,
        instrument_order: Option<InstrumentOrder>,
        contract_orders: Vec<ContractOrder>,
        broker_orders: Vec<BrokerOrder>,
    ) -> Result<(), PortError>;
}
