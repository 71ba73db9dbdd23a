//! Fill propagation: broker → broker stack → contract order → positions →
//! instrument order.

use tracing::{debug, info, warn};

use super::{Hierarchy, StackHandler, escalate, log_step_failure};
use crate::domain::order_stack::{CompletionPolicy, StackError};
use crate::domain::orders::{ContractOrder, ListOfOrders, StackOrder};
use crate::domain::shared::{OrderId, TradeQuantity};
use crate::error::StackHandlerError;
use crate::observability::{record_fill_applied, record_fill_rejected};

/// What happened to one stored broker order during the fill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BrokerFillOutcome {
    /// Nothing new to record.
    Unchanged,
    /// A new fill was recorded and passed up.
    Applied,
    /// The broker reported more than the order's trade; the fill was dropped.
    Rejected,
    /// No live broker order matches the stored one.
    Unmatched,
}

impl StackHandler {
    /// Pass fills up the normal hierarchy.
    ///
    /// # Errors
    ///
    /// Only failures to list a stack are returned; per-order failures are
    /// logged and skipped.
    pub async fn process_fills_stack(&self) -> Result<(), StackHandlerError> {
        self.pass_fills_from_broker_to_broker_stack(Hierarchy::Normal).await?;
        self.pass_fills_from_broker_up_to_contract(Hierarchy::Normal).await?;
        self.pass_fills_from_contract_up_to_instrument().await
    }

    pub(crate) async fn pass_fills_from_broker_to_broker_stack(
        &self,
        hierarchy: Hierarchy,
    ) -> Result<(), StackHandlerError> {
        for broker_order_id in self.broker_stack(hierarchy).list_order_ids().await? {
            if let Err(err) = self
                .apply_broker_fill_from_broker_to_broker_database(hierarchy, broker_order_id)
                .await
            {
                log_step_failure("broker_fills", &err);
            }
        }
        Ok(())
    }

    pub(crate) async fn pass_fills_from_broker_up_to_contract(
        &self,
        hierarchy: Hierarchy,
    ) -> Result<(), StackHandlerError> {
        for contract_order_id in self.contract_stack(hierarchy).list_order_ids().await? {
            if let Err(err) = self
                .apply_broker_fills_to_contract_order(hierarchy, contract_order_id)
                .await
            {
                log_step_failure("contract_fills", &err);
            }
        }
        Ok(())
    }

    async fn pass_fills_from_contract_up_to_instrument(&self) -> Result<(), StackHandlerError> {
        for instrument_order_id in self.stacks.instrument.list_order_ids().await? {
            if let Err(err) = self.apply_contract_fills_to_instrument_order(instrument_order_id).await {
                log_step_failure("instrument_fills", &err);
            }
        }
        Ok(())
    }

    /// Merge what the broker reports for one stored broker order.
    ///
    /// An over-fill is discarded with a warning and the stored fill is left
    /// as it was.
    pub(crate) async fn apply_broker_fill_from_broker_to_broker_database(
        &self,
        hierarchy: Hierarchy,
        broker_order_id: OrderId,
    ) -> Result<BrokerFillOutcome, StackHandlerError> {
        let broker_stack = self.broker_stack(hierarchy);
        let Some(stored) = broker_stack.get(broker_order_id).await? else {
            return Ok(BrokerFillOutcome::Unchanged);
        };
        if !stored.base().is_active() || stored.base().fill_equals_trade() {
            return Ok(BrokerFillOutcome::Unchanged);
        }

        let Some(live) = self.broker.match_stored_order_to_live_order(&stored).await? else {
            warn!(
                stack = %broker_stack.name(),
                order_id = %broker_order_id,
                key = %stored.order_key(),
                "Stored broker order does not match any live order, can't fill"
            );
            return Ok(BrokerFillOutcome::Unmatched);
        };
        if live.base().fill() == stored.base().fill() {
            return Ok(BrokerFillOutcome::Unchanged);
        }

        let live = self.broker.compute_total_commission(live).await?;
        match broker_stack.add_execution_details(broker_order_id, &live).await {
            Ok(_) => {}
            Err(StackError::FillExceedsTrade { trade, fill, .. }) => {
                record_fill_rejected(broker_stack.name());
                warn!(
                    stack = %broker_stack.name(),
                    order_id = %broker_order_id,
                    %trade,
                    %fill,
                    "Fill exceeds trade, ignoring fill (hopefully it will be corrected)"
                );
                return Ok(BrokerFillOutcome::Rejected);
            }
            Err(err) => return Err(err.into()),
        }
        record_fill_applied(broker_stack.name());
        info!(
            stack = %broker_stack.name(),
            order_id = %broker_order_id,
            fill = %live.base().fill(),
            "Applied broker fill"
        );

        if let Some(contract_order_id) = stored.base().parent() {
            self.apply_broker_fills_to_contract_order(hierarchy, contract_order_id)
                .await?;
        }
        Ok(BrokerFillOutcome::Applied)
    }

    /// Aggregate the broker children's fills onto a contract order and push
    /// the increment into positions.
    pub(crate) async fn apply_broker_fills_to_contract_order(
        &self,
        hierarchy: Hierarchy,
        contract_order_id: OrderId,
    ) -> Result<(), StackHandlerError> {
        let contract_stack = self.contract_stack(hierarchy);
        let Some(before_fill) = contract_stack.get(contract_order_id).await? else {
            return Ok(());
        };
        if !before_fill.base().has_children() {
            return Ok(());
        }

        let children = self
            .broker_stack(hierarchy)
            .get_list_from_ids(before_fill.base().children())
            .await?;
        if children.all_zero_fills() {
            return Ok(());
        }
        let Some(total_filled) = children.total_filled_qty()? else {
            return Ok(());
        };
        if &total_filled == before_fill.base().fill() {
            return Ok(());
        }

        match contract_stack
            .change_fill_qty(
                contract_order_id,
                total_filled.clone(),
                children.average_fill_price(),
                children.final_fill_datetime(),
            )
            .await
        {
            Ok(_) => {}
            Err(StackError::FillExceedsTrade { trade, fill, .. }) => {
                record_fill_rejected(contract_stack.name());
                warn!(
                    stack = %contract_stack.name(),
                    order_id = %contract_order_id,
                    %trade,
                    %fill,
                    "Aggregated fill exceeds contract trade, ignoring"
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
        record_fill_applied(contract_stack.name());

        self.apply_position_change(hierarchy, &before_fill, &total_filled)
            .await?;

        match hierarchy {
            Hierarchy::Normal => {
                if let Some(instrument_order_id) = before_fill.base().parent() {
                    self.apply_contract_fills_to_instrument_order(instrument_order_id)
                        .await?;
                    self.handle_completed_instrument_order(instrument_order_id, CompletionPolicy::STRICT)
                        .await?;
                }
            }
            Hierarchy::StopLoss => {
                self.handle_completed_stop_loss_contract_order(contract_order_id, CompletionPolicy::STRICT)
                    .await?;
            }
        }
        Ok(())
    }

    /// Push `total_filled - before_fill.fill` into contract and instrument
    /// positions. A zero increment is a no-op.
    async fn apply_position_change(
        &self,
        hierarchy: Hierarchy,
        before_fill: &ContractOrder,
        total_filled: &TradeQuantity,
    ) -> Result<(), StackHandlerError> {
        let delta = total_filled.checked_sub(before_fill.base().fill())?;
        if delta.equals_zero() {
            return Ok(());
        }

        self.positions
            .apply_contract_position_delta(before_fill, &delta)
            .await?;
        self.positions
            .apply_instrument_position_delta(before_fill, &delta)
            .await?;
        info!(
            hierarchy = hierarchy.label(),
            key = %before_fill.order_key(),
            %delta,
            "Updated positions from fill"
        );

        if hierarchy == Hierarchy::StopLoss {
            self.set_stop_loss_override_for_order(before_fill)
                .await
                .map_err(|e| escalate("stop_loss_override", e))?;
        }
        Ok(())
    }

    /// Aggregate contract-order fills onto their instrument order.
    pub(crate) async fn apply_contract_fills_to_instrument_order(
        &self,
        instrument_order_id: OrderId,
    ) -> Result<(), StackHandlerError> {
        let Some(instrument_order) = self.stacks.instrument.get(instrument_order_id).await? else {
            return Ok(());
        };
        if !instrument_order.base().has_children() {
            return Ok(());
        }
        let contract_orders = self
            .stacks
            .contract
            .get_list_from_ids(instrument_order.base().children())
            .await?;
        if contract_orders.all_zero_fills() {
            return Ok(());
        }

        let total_filled = instrument_fill(&contract_orders);
        if &total_filled == instrument_order.base().fill() {
            return Ok(());
        }

        match self
            .stacks
            .instrument
            .change_fill_qty(
                instrument_order_id,
                total_filled,
                contract_orders.average_fill_price(),
                contract_orders.final_fill_datetime(),
            )
            .await
        {
            Ok(updated) => {
                debug!(order_id = %instrument_order_id, fill = %updated.base().fill(), "Applied fill to instrument order");
                Ok(())
            }
            Err(StackError::FillExceedsTrade { trade, fill, .. }) => {
                record_fill_rejected(self.stacks.instrument.name());
                warn!(
                    order_id = %instrument_order_id,
                    %trade,
                    %fill,
                    "Contract fills exceed instrument trade, ignoring"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Net instrument fill: the signed sum over every leg of every contract order.
fn instrument_fill(contract_orders: &ListOfOrders<ContractOrder>) -> TradeQuantity {
    TradeQuantity::single(
        contract_orders
            .orders()
            .iter()
            .map(|o| o.base().fill().total_qty())
            .sum(),
    )
}
