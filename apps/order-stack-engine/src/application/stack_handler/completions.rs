//! Completion and retirement of order families.
//!
//! A family is complete when every member satisfies the completion policy.
//! It is archived first and then deactivated, so history holds the
//! pre-deactivation state. Physical removal happens later, in safe removal.

use tracing::{debug, info};

use super::{Hierarchy, StackHandler, log_step_failure};
use crate::domain::order_stack::CompletionPolicy;
use crate::domain::orders::{BrokerOrder, ContractOrder, InstrumentOrder, OrderFamily, StackOrder};
use crate::domain::shared::OrderId;
use crate::error::{ErrorCode, StackHandlerError};
use crate::observability::record_family_completed;

impl StackHandler {
    /// Retire every complete instrument-order family.
    ///
    /// # Errors
    ///
    /// Only failures to list the instrument stack are returned.
    pub async fn process_completions_stack(&self, policy: CompletionPolicy) -> Result<(), StackHandlerError> {
        for instrument_order_id in self.stacks.instrument.list_order_ids().await? {
            if let Err(err) = self
                .handle_completed_instrument_order(instrument_order_id, policy)
                .await
            {
                log_step_failure("completions", &err);
            }
        }
        Ok(())
    }

    /// Retire every complete stop-loss family.
    ///
    /// # Errors
    ///
    /// Only failures to list the stop-loss contract stack are returned.
    pub async fn process_completions_stop_loss_stack(
        &self,
        policy: CompletionPolicy,
    ) -> Result<(), StackHandlerError> {
        for contract_order_id in self.stacks.stop_loss_contract.list_order_ids().await? {
            if let Err(err) = self
                .handle_completed_stop_loss_contract_order(contract_order_id, policy)
                .await
            {
                log_step_failure("stop_loss_completions", &err);
            }
        }
        Ok(())
    }

    /// Archive and deactivate an instrument order with all its contract and
    /// broker descendants if they are all complete.
    ///
    /// Returns `true` if the family was retired.
    pub(crate) async fn handle_completed_instrument_order(
        &self,
        instrument_order_id: OrderId,
        policy: CompletionPolicy,
    ) -> Result<bool, StackHandlerError> {
        let Some(instrument_order) = self.stacks.instrument.get(instrument_order_id).await? else {
            return Ok(false);
        };
        if !instrument_order.base().is_active() || !policy.is_satisfied_by(instrument_order.base()) {
            return Ok(false);
        }

        let contract_orders = self
            .stacks
            .contract
            .get_list_from_ids(instrument_order.base().children())
            .await?
            .into_inner();
        let mut broker_order_ids = Vec::new();
        for contract_order in &contract_orders {
            broker_order_ids.extend_from_slice(contract_order.base().children());
        }
        let broker_orders = self
            .stacks
            .broker
            .get_list_from_ids(&broker_order_ids)
            .await?
            .into_inner();

        if !family_is_complete(&contract_orders, &broker_orders, policy) {
            return Ok(false);
        }

        let family = OrderFamily::for_instrument_order(
            instrument_order_id,
            order_ids(&contract_orders),
            broker_order_ids,
        );
        self.archive_family(Some(instrument_order), contract_orders, broker_orders)
            .await?;
        self.deactivate_family(Hierarchy::Normal, &family).await?;
        Ok(true)
    }

    /// Archive and deactivate a stop-loss contract order with its broker
    /// children if they are all complete.
    pub(crate) async fn handle_completed_stop_loss_contract_order(
        &self,
        contract_order_id: OrderId,
        policy: CompletionPolicy,
    ) -> Result<bool, StackHandlerError> {
        let Some(contract_order) = self.stacks.stop_loss_contract.get(contract_order_id).await? else {
            return Ok(false);
        };
        if !contract_order.base().is_active() {
            return Ok(false);
        }

        let broker_order_ids = contract_order.base().children().to_vec();
        let broker_orders = self
            .stacks
            .stop_loss_broker
            .get_list_from_ids(&broker_order_ids)
            .await?
            .into_inner();
        let contract_orders = vec![contract_order];
        if !family_is_complete(&contract_orders, &broker_orders, policy) {
            return Ok(false);
        }

        let family = OrderFamily::for_contract_order(contract_order_id, broker_order_ids);
        self.archive_family(None, contract_orders, broker_orders).await?;
        self.deactivate_family(Hierarchy::StopLoss, &family).await?;
        Ok(true)
    }

    async fn archive_family(
        &self,
        instrument_order: Option<InstrumentOrder>,
        contract_orders: Vec<ContractOrder>,
        broker_orders: Vec<BrokerOrder>,
    ) -> Result<(), StackHandlerError> {
        self.archive
            .add_historic_orders(instrument_order, contract_orders, broker_orders)
            .await
            .map_err(|e| {
                StackHandlerError::new(
                    ErrorCode::StorageFailure,
                    format!("can't archive completed family, leaving it active: {e}"),
                )
            })
    }

    async fn deactivate_family(
        &self,
        hierarchy: Hierarchy,
        family: &OrderFamily,
    ) -> Result<(), StackHandlerError> {
        if let Some(instrument_order_id) = family.instrument_order_id {
            self.stacks.instrument.deactivate(instrument_order_id).await?;
        }
        for contract_order_id in &family.contract_order_ids {
            self.contract_stack(hierarchy)
                .deactivate(*contract_order_id)
                .await?;
        }
        for broker_order_id in &family.broker_order_ids {
            self.broker_stack(hierarchy).deactivate(*broker_order_id).await?;
        }

        record_family_completed(hierarchy.label());
        info!(
            hierarchy = hierarchy.label(),
            instrument_order_id = ?family.instrument_order_id,
            orders = family.len(),
            "Order family completed and archived"
        );
        debug!(?family, "Deactivated family");
        Ok(())
    }
}

fn family_is_complete(
    contract_orders: &[ContractOrder],
    broker_orders: &[BrokerOrder],
    policy: CompletionPolicy,
) -> bool {
    contract_orders.iter().all(|o| policy.is_satisfied_by(o.base()))
        && broker_orders.iter().all(|o| policy.is_satisfied_by(o.base()))
}

fn order_ids<O: StackOrder>(orders: &[O]) -> Vec<OrderId> {
    orders.iter().filter_map(|o| o.base().order_id()).collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::BrokerPort;
    use crate::application::stack_handler::test_support::{Fixture, fixture};
    use crate::domain::orders::OrderType;
    use crate::domain::shared::{FuturesContract, TradeQuantity};

    async fn partially_filled_family(fixture: &Fixture) -> (OrderId, String) {
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
        let child =
            BrokerOrder::from_contract_order(&parent, TradeQuantity::single(10), OrderType::Market, "algo_market")
                .unwrap();
        let placed = fixture.broker.submit(&child).await.unwrap().unwrap();
        handler
            .spawn_broker_orders(contract_ids[0], vec![placed.order])
            .await
            .unwrap();
        fixture
            .broker
            .report_fill(&placed.control_ref, TradeQuantity::single(6), dec!(100))
            .await
            .unwrap();
        handler.process_fills_stack().await.unwrap();
        (instrument_id, placed.control_ref)
    }

    #[tokio::test]
    async fn partial_family_is_only_complete_when_partials_allowed() {
        let fixture = fixture();
        let (instrument_id, _) = partially_filled_family(&fixture).await;

        fixture
            .handler
            .process_completions_stack(CompletionPolicy::STRICT)
            .await
            .unwrap();
        let order = fixture.handler.stacks().instrument.get_or_not_found(instrument_id).await.unwrap();
        assert!(order.base().is_active());
        assert!(fixture.archive.families().await.is_empty());

        fixture
            .handler
            .process_completions_stack(CompletionPolicy::new(true, false, false))
            .await
            .unwrap();
        let order = fixture.handler.stacks().instrument.get_or_not_found(instrument_id).await.unwrap();
        assert!(!order.base().is_active());

        let families = fixture.archive.families().await;
        assert_eq!(families.len(), 1);
        let archived = &families[0];
        assert!(archived.instrument_order.as_ref().unwrap().base().is_active());
        assert_eq!(archived.contract_orders.len(), 1);
        assert_eq!(archived.broker_orders.len(), 1);
    }

    #[tokio::test]
    async fn full_fill_retires_family_during_fill_pass() {
        let fixture = fixture();
        let (instrument_id, control_ref) = partially_filled_family(&fixture).await;
        fixture
            .broker
            .report_fill(&control_ref, TradeQuantity::single(10), dec!(101))
            .await
            .unwrap();
        fixture.handler.process_fills_stack().await.unwrap();

        let stacks = fixture.handler.stacks();
        let order = stacks.instrument.get_or_not_found(instrument_id).await.unwrap();
        assert!(!order.base().is_active());
        assert_eq!(stacks.contract.count_active().await.unwrap(), 0);
        assert_eq!(stacks.broker.count_active().await.unwrap(), 0);
        assert_eq!(fixture.archive.families().await.len(), 1);

        // Already inactive: not archived twice.
        fixture
            .handler
            .process_completions_stack(CompletionPolicy::STRICT)
            .await
            .unwrap();
        assert_eq!(fixture.archive.families().await.len(), 1);
    }

    #[tokio::test]
    async fn unfilled_stop_loss_is_complete_only_with_zero_allowed() {
        let fixture = fixture();
        let contract = FuturesContract::new("GOLD", "20240600");
        let stop = ContractOrder::outright("trend", &contract, -10, OrderType::Stop).with_stop_price(dec!(95));
        let stop_id = fixture.handler.stacks().stop_loss_contract.put(stop).await.unwrap();

        let retired = fixture
            .handler
            .handle_completed_stop_loss_contract_order(stop_id, CompletionPolicy::STRICT)
            .await
            .unwrap();
        assert!(!retired);

        let retired = fixture
            .handler
            .handle_completed_stop_loss_contract_order(stop_id, CompletionPolicy::new(true, true, false))
            .await
            .unwrap();
        assert!(retired);
        let families = fixture.archive.families().await;
        assert!(families[0].instrument_order.is_none());
    }
}
