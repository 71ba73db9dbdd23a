//! Market algo: one market order for the whole amount.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AlgoId, ExecutionAlgo};
use crate::application::ports::{BrokerError, BrokerPort, OrderWithControls};
use crate::domain::orders::{BrokerOrder, ContractOrder, OrderType, StackOrder};

/// Places a single market order.
pub struct MarketAlgo {
    broker: Arc<dyn BrokerPort>,
}

impl MarketAlgo {
    /// Create the algo over a broker connection.
    #[must_use]
    pub fn new(broker: Arc<dyn BrokerPort>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl ExecutionAlgo for MarketAlgo {
    fn id(&self) -> AlgoId {
        AlgoId::AlgoMarket
    }

    async fn submit_trade(
        &self,
        contract_order: &ContractOrder,
    ) -> Result<Option<OrderWithControls>, BrokerError> {
        let Ok(broker_order) = BrokerOrder::from_contract_order(
            contract_order,
            contract_order.base().trade().clone(),
            OrderType::Market,
            self.id().as_str(),
        ) else {
            return Ok(None);
        };
        self.broker.submit(&broker_order).await
    }
}
