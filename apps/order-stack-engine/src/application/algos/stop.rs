//! Stop algo: one stop order for the whole amount.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{AlgoId, ExecutionAlgo};
use crate::application::ports::{BrokerError, BrokerPort, OrderWithControls};
use crate::domain::orders::{BrokerOrder, ContractOrder, OrderType, StackOrder};

/// Places a single stop order at the contract order's stop price.
pub struct StopAlgo {
    broker: Arc<dyn BrokerPort>,
}

impl StopAlgo {
    /// Create the algo over a broker connection.
    #[must_use]
    pub fn new(broker: Arc<dyn BrokerPort>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl ExecutionAlgo for StopAlgo {
    fn id(&self) -> AlgoId {
        AlgoId::AlgoStop
    }

    async fn submit_trade(
        &self,
        contract_order: &ContractOrder,
    ) -> Result<Option<OrderWithControls>, BrokerError> {
        if contract_order.stop_price().is_none() {
            warn!(
                order_id = ?contract_order.base().order_id(),
                key = %contract_order.order_key(),
                "Stop algo given an order without a stop price, not submitting"
            );
            return Ok(None);
        }

        let broker_order = match BrokerOrder::from_contract_order(
            contract_order,
            contract_order.base().trade().clone(),
            OrderType::Stop,
            self.id().as_str(),
        ) {
            Ok(order) => order,
            Err(e) => {
                warn!(key = %contract_order.order_key(), error = %e, "Cannot build stop broker order");
                return Ok(None);
            }
        };

        self.broker.submit(&broker_order).await
    }
}
