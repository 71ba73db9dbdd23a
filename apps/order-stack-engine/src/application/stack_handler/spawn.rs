//! Putting new orders and their children on the normal stacks.

use tracing::info;

use super::{StackHandler, add_children_to_parent_or_rollback_children, put_children_on_stack};
use crate::domain::orders::{BrokerOrder, ContractOrder, InstrumentOrder, StackOrder};
use crate::domain::shared::OrderId;
use crate::error::StackHandlerError;

impl StackHandler {
    /// Put a new strategy order on the instrument stack.
    ///
    /// # Errors
    ///
    /// Propagates stack failures.
    pub async fn put_instrument_order(&self, order: InstrumentOrder) -> Result<OrderId, StackHandlerError> {
        let key = order.order_key();
        let order_id = self.stacks.instrument.put(order).await?;
        info!(order_id = %order_id, key = %key, "New instrument order");
        Ok(order_id)
    }

    /// Put contract orders for an instrument order and link them as its
    /// children.
    ///
    /// With catastrophic stop-losses enabled, any unresolved stop-loss level
    /// or delay days are filled in from config here.
    ///
    /// # Errors
    ///
    /// `RECOVERABLE_ROLLBACK` when nothing was left on the stacks,
    /// `STACK_CORRUPTED` when the rollback itself failed.
    pub async fn spawn_contract_orders(
        &self,
        instrument_order_id: OrderId,
        contract_orders: Vec<ContractOrder>,
    ) -> Result<Vec<OrderId>, StackHandlerError> {
        let parent = self.stacks.instrument.get_or_not_found(instrument_order_id).await?;
        let children = contract_orders
            .into_iter()
            .map(|order| self.prepare_contract_order(order, instrument_order_id))
            .collect();

        let child_ids = put_children_on_stack(&self.stacks.contract, &parent.order_key(), children).await?;
        add_children_to_parent_or_rollback_children(
            &self.stacks.instrument,
            &self.stacks.contract,
            instrument_order_id,
            &child_ids,
        )
        .await?;
        info!(
            instrument_order_id = %instrument_order_id,
            ?child_ids,
            "Spawned contract orders"
        );
        Ok(child_ids)
    }

    /// Put broker orders for a contract order and link them as its children.
    ///
    /// # Errors
    ///
    /// As [`Self::spawn_contract_orders`]; additionally `INVALID_ORDER` when
    /// the contract order already has children.
    pub async fn spawn_broker_orders(
        &self,
        contract_order_id: OrderId,
        broker_orders: Vec<BrokerOrder>,
    ) -> Result<Vec<OrderId>, StackHandlerError> {
        let parent = self.stacks.contract.get_or_not_found(contract_order_id).await?;
        let children = broker_orders
            .into_iter()
            .map(|order| {
                let base = order.base().clone().with_parent(contract_order_id);
                order.with_base(base)
            })
            .collect();

        let child_ids = put_children_on_stack(&self.stacks.broker, &parent.order_key(), children).await?;
        add_children_to_parent_or_rollback_children(
            &self.stacks.contract,
            &self.stacks.broker,
            contract_order_id,
            &child_ids,
        )
        .await?;
        info!(contract_order_id = %contract_order_id, ?child_ids, "Spawned broker orders");
        Ok(child_ids)
    }

    fn prepare_contract_order(&self, order: ContractOrder, parent: OrderId) -> ContractOrder {
        let base = order.base().clone().with_parent(parent);
        let order = order.with_base(base);

        let info = order.stop_loss_info();
        if !self.stop_loss_config.use_catastrophic || info.is_no_stop_loss() || info.is_resolved() {
            return order;
        }
        let info = info.clone().with_defaults(
            self.stop_loss_config.catastrophic_level,
            self.stop_loss_config.delay_days_after_stop_loss,
        );
        order.with_stop_loss_info(info)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::stack_handler::test_support::fixture;
    use crate::domain::orders::{OrderType, StopLossInfo};
    use crate::domain::shared::{FuturesContract, TradeQuantity};
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn contract_children_get_parent_and_stop_loss_defaults() {
        let fixture = fixture();
        let handler = &fixture.handler;
        let contract = FuturesContract::new("GOLD", "20240600");
        let instrument_id = handler
            .put_instrument_order(InstrumentOrder::new("trend", "GOLD", 10, OrderType::Market))
            .await
            .unwrap();

        let child = ContractOrder::outright("trend", &contract, 10, OrderType::Market)
            .with_stop_loss_info(StopLossInfo::new_order(None, Some(7)));
        let ids = handler.spawn_contract_orders(instrument_id, vec![child]).await.unwrap();

        let stored = handler.stacks().contract.get_or_not_found(ids[0]).await.unwrap();
        assert_eq!(stored.base().parent(), Some(instrument_id));
        assert_eq!(stored.stop_loss_info().stop_loss_level, Some(dec!(0.05)));
        assert_eq!(stored.stop_loss_info().delay_days, Some(7));

        let parent = handler.stacks().instrument.get_or_not_found(instrument_id).await.unwrap();
        assert_eq!(parent.base().children(), ids.as_slice());
    }

    #[tokio::test]
    async fn second_broker_batch_is_rolled_back() {
        let fixture = fixture();
        let handler = &fixture.handler;
        let contract = FuturesContract::new("GOLD", "20240600");
        let instrument_id = handler
            .put_instrument_order(InstrumentOrder::new("trend", "GOLD", 10, OrderType::Market))
            .await
            .unwrap();
        let contract_ids = handler
            .spawn_contract_orders(
                instrument_id,
                vec![ContractOrder::outright("trend", &contract, 10, OrderType::Market)],
            )
            .await
            .unwrap();
        let parent = handler.stacks().contract.get_or_not_found(contract_ids[0]).await.unwrap();
        let child = || {
            BrokerOrder::from_contract_order(&parent, TradeQuantity::single(5), OrderType::Market, "algo_market")
                .unwrap()
        };

        handler.spawn_broker_orders(contract_ids[0], vec![child()]).await.unwrap();
        let err = handler
            .spawn_broker_orders(contract_ids[0], vec![child()])
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::RecoverableRollback);
        assert_eq!(handler.stacks().broker.list_order_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_parent_is_not_found() {
        let fixture = fixture();
        let err = fixture
            .handler
            .spawn_broker_orders(OrderId::new(99), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
