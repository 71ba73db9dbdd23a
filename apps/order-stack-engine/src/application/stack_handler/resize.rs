//! Resizing and cancelling stop-losses, and carrying size changes through to
//! the broker.

use tracing::{debug, info};

use super::{StackHandler, StopLossAction, escalate, log_step_failure};
use crate::domain::orders::{ContractOrder, StackOrder};
use crate::domain::shared::{OrderId, TradeQuantity};
use crate::error::{ErrorCode, StackHandlerError};
use crate::observability::record_stop_loss_resized;

impl StackHandler {
    /// Change a stop-loss contract order's trade by `change_by`.
    ///
    /// A resize to zero cancels the live broker order and retires the
    /// stop-loss. Otherwise the change is scaled by trade limits and the new
    /// size is pushed to the broker child.
    ///
    /// # Errors
    ///
    /// Fatal `INVALID_CONFIGURATION` when the change would flip the stop's
    /// direction; `STACK_CORRUPTED` when the stack rejects the new size.
    pub async fn change_existing_stop_loss_order_size(
        &self,
        order: &ContractOrder,
        change_by: i64,
    ) -> Result<StopLossAction, StackHandlerError> {
        let order_id = stack_order_id(order)?;
        let current = order.base().trade().as_single_trade_qty_or_error()?;
        let new_size = current + change_by;

        if new_size == 0 {
            return self.retire_stop_loss(order, order_id).await;
        }
        if new_size.signum() != current.signum() {
            return Err(escalate(
                "stop_loss_resize",
                StackHandlerError::invalid_configuration(format!(
                    "changing stop-loss {current} by {change_by} would reverse it"
                ))
                .with_context("order_id", order_id),
            ));
        }

        let change = TradeQuantity::single(change_by);
        let limit = self
            .controls
            .what_trade_is_possible(&order.base().instrument_strategy(), &change)
            .await?;
        let allowed = change.scaled_to_abs_limit(limit).as_single_trade_qty_or_error()?;
        if allowed == 0 {
            debug!(order_id = %order_id, change_by, "Trade limits allow no resize");
            return Ok(StopLossAction::Resized {
                order_id,
                trade: order.base().trade().clone(),
            });
        }

        let new_trade = TradeQuantity::single(current + allowed);
        self.stacks
            .stop_loss_contract
            .change_trade_qty(order_id, new_trade.clone())
            .await
            .map_err(|e| {
                escalate(
                    "stop_loss_resize",
                    StackHandlerError::stack_corrupted(format!("can't resize stop-loss: {e}"))
                        .with_context("order_id", order_id),
                )
            })?;
        record_stop_loss_resized(order.base().instrument().as_str(), "resize");
        info!(order_id = %order_id, from = current, to = %new_trade, "Resized stop-loss");

        self.propagate_stop_loss_change_for_order(order_id).await?;
        Ok(StopLossAction::Resized {
            order_id,
            trade: new_trade,
        })
    }

    /// Resize a stop-loss to zero.
    pub(crate) async fn cancel_stop_loss_order(&self, order: &ContractOrder) -> Result<StopLossAction, StackHandlerError> {
        let current = order.base().trade().as_single_trade_qty_or_error()?;
        self.change_existing_stop_loss_order_size(order, -current).await
    }

    async fn retire_stop_loss(&self, order: &ContractOrder, order_id: OrderId) -> Result<StopLossAction, StackHandlerError> {
        let children = self
            .stacks
            .stop_loss_broker
            .get_list_from_ids(order.base().children())
            .await?;
        for child in children.orders() {
            let child_base = child.base();
            if !child_base.is_active() {
                continue;
            }
            if !child_base.fill_equals_trade() {
                self.broker.cancel_order(child).await?;
            }
            if let Some(child_id) = child_base.order_id() {
                self.stacks.stop_loss_broker.deactivate(child_id).await?;
            }
        }
        self.stacks.stop_loss_contract.deactivate(order_id).await?;

        record_stop_loss_resized(order.base().instrument().as_str(), "cancel");
        info!(order_id = %order_id, key = %order.order_key(), "Cancelled stop-loss");
        Ok(StopLossAction::Cancelled { order_id })
    }

    /// Bring every live stop-loss broker order in line with its parent's
    /// current trade.
    ///
    /// # Errors
    ///
    /// Only failures to list the stop-loss contract stack are returned.
    pub async fn propagate_stop_loss_changes_to_broker(&self) -> Result<(), StackHandlerError> {
        for order_id in self.stacks.stop_loss_contract.list_order_ids().await? {
            if let Err(err) = self.propagate_stop_loss_change_for_order(order_id).await {
                log_step_failure("propagate_resizes", &err);
            }
        }
        Ok(())
    }

    /// Returns `true` if the broker order was modified.
    pub(crate) async fn propagate_stop_loss_change_for_order(&self, order_id: OrderId) -> Result<bool, StackHandlerError> {
        let order = self.stacks.stop_loss_contract.get_or_not_found(order_id).await?;
        if !order.base().is_active() {
            return Ok(false);
        }
        let children = self
            .stacks
            .stop_loss_broker
            .get_list_from_ids(order.base().children())
            .await?
            .into_inner();
        let (mut live, done): (Vec<_>, Vec<_>) = children
            .into_iter()
            .filter(|c| c.base().is_active())
            .partition(|c| !c.base().fill_equals_trade());
        let Some(child) = live.pop() else {
            debug!(order_id = %order_id, "Stop-loss has no live broker order");
            return Ok(false);
        };
        if !live.is_empty() {
            return Err(escalate(
                "propagate_resizes",
                StackHandlerError::stack_corrupted("stop-loss has more than one live broker order")
                    .with_context("order_id", order_id),
            ));
        }

        // Fully filled siblings already cover part of the trade.
        let mut wanted = order.base().trade().clone();
        for sibling in &done {
            wanted = wanted.checked_sub(sibling.base().fill())?;
        }
        let limit = self
            .controls
            .what_trade_is_possible(&order.base().instrument_strategy(), &wanted)
            .await?;
        let target = wanted.scaled_to_abs_limit(limit);
        if target.equals_zero() || child.base().trade() == &target {
            return Ok(false);
        }

        let child_id = stack_order_id(&child)?;
        self.broker.modify_order_quantity(&child, &target).await?;
        self.stacks
            .stop_loss_broker
            .change_trade_qty(child_id, target.clone())
            .await
            .map_err(|e| {
                escalate(
                    "propagate_resizes",
                    StackHandlerError::stack_corrupted(format!(
                        "broker order resized at broker but not on stack: {e}"
                    ))
                    .with_context("broker_order_id", child_id),
                )
            })?;

        record_stop_loss_resized(order.base().instrument().as_str(), "propagate");
        info!(
            order_id = %order_id,
            broker_order_id = %child_id,
            from = %child.base().trade(),
            to = %target,
            "Resized stop-loss broker order"
        );
        Ok(true)
    }
}

fn stack_order_id<O: StackOrder>(order: &O) -> Result<OrderId, StackHandlerError> {
    order.base().order_id().ok_or_else(|| {
        StackHandlerError::new(ErrorCode::InvalidOrder, "order is not on a stack")
            .with_context("key", order.order_key())
    })
}
