//! The sweep pipelines: the regular pass and end-of-day safe removal.

use std::future::Future;

use tracing::{info, instrument};

use super::{StackHandler, log_step_failure};
use crate::application::ports::BrokerError;
use crate::domain::order_stack::{CompletionPolicy, OrderStack};
use crate::domain::orders::StackOrder;
use crate::error::StackHandlerError;
use crate::observability::update_active_orders;

/// Outcome of one sweep.
///
/// Per-order failures are logged where they happen and never fail a step;
/// a step only fails when a whole stack could not be read or written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Steps that failed, in pipeline order.
    pub failed_steps: Vec<&'static str>,
}

impl SweepReport {
    /// True when every step ran.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_steps.is_empty()
    }

    async fn step<F>(&mut self, name: &'static str, step: F)
    where
        F: Future<Output = Result<(), StackHandlerError>>,
    {
        if let Err(err) = step.await {
            log_step_failure(name, &err);
            self.failed_steps.push(name);
        }
    }
}

impl StackHandler {
    /// One regular pass over every stack.
    #[instrument(skip(self), name = "regular_sweep")]
    pub async fn process_stack(&self) -> SweepReport {
        let mut report = SweepReport::default();
        report.step("process_fills", self.process_fills_stack()).await;
        report
            .step("create_stop_losses", async {
                self.create_stop_loss_orders_from_fills().await.map(drop)
            })
            .await;
        report
            .step("retry_stop_losses", async {
                self.retry_unplaced_stop_loss_orders().await.map(drop)
            })
            .await;
        report
            .step("propagate_resizes", self.propagate_stop_loss_changes_to_broker())
            .await;
        report
            .step("stop_loss_fills", self.process_fills_stop_loss_stack())
            .await;
        report
            .step("completions", self.process_completions_stack(CompletionPolicy::STRICT))
            .await;
        report
            .step(
                "stop_loss_completions",
                self.process_completions_stop_loss_stack(CompletionPolicy::STRICT),
            )
            .await;
        report.step("gauges", self.update_gauges()).await;
        report
    }

    /// End-of-day clean-up: cancel what is still resting, take the last
    /// fills, retire everything that can be retired and purge deactivated
    /// orders.
    ///
    /// Partially filled and unfilled normal families are retired; resting
    /// stop-losses survive unless `stop_loss_safe_removal_allow_zero` is set.
    #[instrument(skip(self), name = "safe_stack_removal")]
    pub async fn safe_stack_removal(&self) -> SweepReport {
        let stop_loss_policy =
            CompletionPolicy::new(true, self.sweep_config.stop_loss_safe_removal_allow_zero, false);

        let mut report = SweepReport::default();
        report
            .step("cancel_stale_orders", self.cancel_stale_broker_orders())
            .await;
        report.step("process_fills", self.process_fills_stack()).await;
        report
            .step("create_stop_losses", async {
                self.create_stop_loss_orders_from_fills().await.map(drop)
            })
            .await;
        report
            .step(
                "completions",
                self.process_completions_stack(CompletionPolicy::new(true, true, false)),
            )
            .await;
        report
            .step("stop_loss_fills", self.process_fills_stop_loss_stack())
            .await;
        report
            .step(
                "stop_loss_completions",
                self.process_completions_stop_loss_stack(stop_loss_policy),
            )
            .await;
        report.step("remove_deactivated", self.remove_all_deactivated()).await;
        report.step("gauges", self.update_gauges()).await;
        info!(failed_steps = ?report.failed_steps, "Safe stack removal finished");
        report
    }

    /// Cancel every unfilled normal broker order at the broker.
    ///
    /// # Errors
    ///
    /// Only failures to list the broker stack are returned.
    pub async fn cancel_stale_broker_orders(&self) -> Result<(), StackHandlerError> {
        for order in self.stacks.broker.list_unfilled_orders().await? {
            if order.broker_tempid().is_none() {
                continue;
            }
            match self.broker.cancel_order(&order).await {
                Ok(()) => info!(order_id = ?order.base().order_id(), key = %order.order_key(), "Cancelled stale order"),
                Err(BrokerError::OrderNotFound { .. }) => {}
                Err(e) => log_step_failure("cancel_stale_orders", &StackHandlerError::from(e)),
            }
        }
        Ok(())
    }

    async fn remove_all_deactivated(&self) -> Result<(), StackHandlerError> {
        let stacks = &self.stacks;
        let removed = stacks.instrument.remove_all_deactivated().await?
            + stacks.contract.remove_all_deactivated().await?
            + stacks.broker.remove_all_deactivated().await?
            + stacks.stop_loss_contract.remove_all_deactivated().await?
            + stacks.stop_loss_broker.remove_all_deactivated().await?;
        info!(removed, "Purged deactivated orders");
        Ok(())
    }

    async fn update_gauges(&self) -> Result<(), StackHandlerError> {
        let stacks = &self.stacks;
        report_active(&stacks.instrument).await?;
        report_active(&stacks.contract).await?;
        report_active(&stacks.broker).await?;
        report_active(&stacks.stop_loss_contract).await?;
        report_active(&stacks.stop_loss_broker).await
    }
}

async fn report_active<O: StackOrder>(stack: &OrderStack<O>) -> Result<(), StackHandlerError> {
    update_active_orders(stack.name(), stack.count_active().await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::BrokerPort;
    use crate::application::stack_handler::test_support::{config, fixture, fixture_with};
    use crate::domain::orders::{BrokerOrder, ContractOrder, InstrumentOrder, OrderType, StopLossInfo};
    use crate::domain::shared::{FuturesContract, TradeQuantity};

    #[tokio::test]
    async fn empty_stacks_sweep_cleanly() {
        let fixture = fixture();
        assert!(fixture.handler.process_stack().await.is_clean());
        assert!(fixture.handler.safe_stack_removal().await.is_clean());
    }

    #[tokio::test]
    async fn safe_removal_cancels_and_purges_unfilled_family() {
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
        let child =
            BrokerOrder::from_contract_order(&parent, TradeQuantity::single(10), OrderType::Market, "algo_market")
                .unwrap();
        let placed = fixture.broker.submit(&child).await.unwrap().unwrap();
        handler
            .spawn_broker_orders(contract_ids[0], vec![placed.order])
            .await
            .unwrap();

        let report = handler.safe_stack_removal().await;
        assert!(report.is_clean());
        assert_eq!(fixture.broker.cancelled_refs().await, vec![placed.control_ref]);
        assert!(handler.stacks().instrument.list_order_ids().await.unwrap().is_empty());
        assert!(handler.stacks().broker.list_order_ids().await.unwrap().is_empty());
        assert_eq!(fixture.archive.families().await.len(), 1);
    }

    #[tokio::test]
    async fn resting_stop_loss_survives_safe_removal_by_default() {
        let fixture = fixture();
        let contract = FuturesContract::new("GOLD", "20240600");
        let stop = ContractOrder::outright("trend", &contract, -10, OrderType::Stop)
            .with_stop_price(dec!(95))
            .with_stop_loss_info(StopLossInfo::new_order(Some(dec!(0.05)), Some(3)));
        fixture.handler.create_and_send_new_stop_loss_order(stop).await.unwrap();

        fixture.handler.safe_stack_removal().await;
        let stacks = fixture.handler.stacks();
        assert_eq!(stacks.stop_loss_contract.count_active().await.unwrap(), 1);
        assert_eq!(stacks.stop_loss_broker.count_active().await.unwrap(), 1);
        assert!(fixture.broker.cancelled_refs().await.is_empty());
    }

    #[tokio::test]
    async fn unfilled_stop_loss_is_retired_when_configured() {
        let mut config = config();
        config.sweep.stop_loss_safe_removal_allow_zero = true;
        let fixture = fixture_with(&config);
        let contract = FuturesContract::new("GOLD", "20240600");
        let stop = ContractOrder::outright("trend", &contract, -10, OrderType::Stop).with_stop_price(dec!(95));
        fixture.handler.create_and_send_new_stop_loss_order(stop).await.unwrap();

        fixture.handler.safe_stack_removal().await;
        let stacks = fixture.handler.stacks();
        assert!(stacks.stop_loss_contract.list_order_ids().await.unwrap().is_empty());
        assert!(stacks.stop_loss_broker.list_order_ids().await.unwrap().is_empty());
    }
}
