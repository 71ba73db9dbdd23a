//! Creation, gating and dispatch of stop-loss orders.

use tracing::{debug, info, warn};

use super::{StackHandler, StopLossAction, escalate, log_step_failure, rollback_parents_and_children};
use crate::application::ports::OrderWithControls;
use crate::domain::order_stack::StackError;
use crate::domain::orders::{ContractOrder, StackOrder};
use crate::domain::shared::OrderId;
use crate::error::{ErrorCode, StackHandlerError};
use crate::observability::{record_rollback, record_stop_loss_created};

impl StackHandler {
    /// Put a decided stop-loss on the stop-loss contract stack and try to
    /// place it at the broker straight away.
    ///
    /// # Errors
    ///
    /// Propagates stack failures and dispatch errors; see
    /// [`Self::gate_and_dispatch_stop_loss`].
    pub async fn create_and_send_new_stop_loss_order(
        &self,
        order: ContractOrder,
    ) -> Result<StopLossAction, StackHandlerError> {
        let key = order.order_key();
        let trade = order.base().trade().clone();
        let order_id = self.stacks.stop_loss_contract.put(order).await?;
        info!(order_id = %order_id, key = %key, %trade, "New stop-loss contract order");

        let broker_order_id = self.gate_and_dispatch_stop_loss(order_id, true).await?;
        Ok(StopLossAction::Created {
            order_id,
            broker_order_id,
        })
    }

    /// Gate a stop-loss contract order and hand it to the stop-loss algo.
    ///
    /// Returns the new broker order id, or `None` when gating or the algo
    /// held it back. `newly_created` orders are removed again if the broker
    /// order cannot be linked to them.
    ///
    /// # Errors
    ///
    /// `BROKER_UNAVAILABLE` when submission fails (the lock is released),
    /// `RECOVERABLE_ROLLBACK` when linking failed and was undone,
    /// `STACK_CORRUPTED` when a placed order cannot be recorded or undone.
    pub async fn gate_and_dispatch_stop_loss(
        &self,
        order_id: OrderId,
        newly_created: bool,
    ) -> Result<Option<OrderId>, StackHandlerError> {
        let stack = &self.stacks.stop_loss_contract;
        let order = stack.get_or_not_found(order_id).await?;
        let Some(sized) = self.gate_stop_loss_order(&order).await? else {
            return Ok(None);
        };

        stack.lock(order_id).await?;
        let placed = match self.stop_loss_algo.submit_trade(&sized).await {
            Ok(Some(placed)) => placed,
            Ok(None) => {
                stack.unlock(order_id).await?;
                debug!(order_id = %order_id, "Stop-loss algo submitted nothing, released");
                return Ok(None);
            }
            Err(e) => {
                stack.unlock(order_id).await?;
                return Err(StackHandlerError::from(e).with_context("order_id", order_id));
            }
        };

        let broker_order_id = match self.stacks.stop_loss_broker.put(placed.order.clone()).await {
            Ok(id) => id,
            Err(e) => {
                return Err(escalate(
                    "stop_loss_dispatch",
                    StackHandlerError::stack_corrupted(format!(
                        "stop-loss placed at broker but not recorded: {e}"
                    ))
                    .with_context("order_id", order_id)
                    .with_context("control_ref", &placed.control_ref),
                ));
            }
        };

        if let Err(link_err) = stack.add_another_child(order_id, broker_order_id).await {
            return Err(self
                .undo_stop_loss_dispatch(order_id, broker_order_id, &placed, newly_created, link_err)
                .await);
        }
        stack.unlock(order_id).await?;

        record_stop_loss_created(order.base().instrument().as_str(), self.stop_loss_algo.id().as_str());
        info!(
            order_id = %order_id,
            broker_order_id = %broker_order_id,
            control_ref = %placed.control_ref,
            trade = %placed.order.base().trade(),
            stop_price = ?placed.order.stop_price(),
            "Stop-loss placed at broker"
        );
        Ok(Some(broker_order_id))
    }

    /// Re-dispatch stop-losses that have no live broker order, e.g. because
    /// the market was closed when they were created.
    ///
    /// A stop whose broker orders were scaled down by trade limits and have
    /// all filled gets a new broker order for the remainder.
    ///
    /// # Errors
    ///
    /// Only failures to list the stop-loss stacks are returned.
    pub async fn retry_unplaced_stop_loss_orders(&self) -> Result<Vec<OrderId>, StackHandlerError> {
        let mut placed = Vec::new();
        for order in self.stacks.stop_loss_contract.list_orders(true).await? {
            let base = order.base();
            let Some(order_id) = base.order_id() else {
                continue;
            };
            if base.is_locked() || base.fill_equals_trade() {
                continue;
            }
            let children = self
                .stacks
                .stop_loss_broker
                .get_list_from_ids(base.children())
                .await?;
            if children
                .orders()
                .iter()
                .any(|c| c.base().is_active() && !c.base().fill_equals_trade())
            {
                continue;
            }

            match self.gate_and_dispatch_stop_loss(order_id, false).await {
                Ok(Some(broker_order_id)) => placed.push(broker_order_id),
                Ok(None) => {}
                Err(err) => log_step_failure("retry_stop_losses", &err),
            }
        }
        Ok(placed)
    }

    /// Apply locks, market hours and trade limits.
    ///
    /// Returns an unfilled copy sized to what is still unfilled and may be
    /// traded now, or `None` when nothing may be. The stored order keeps its
    /// full size.
    async fn gate_stop_loss_order(&self, order: &ContractOrder) -> Result<Option<ContractOrder>, StackHandlerError> {
        let base = order.base();
        if base.is_locked() {
            debug!(order_id = ?base.order_id(), "Stop-loss locked by another agent");
            return Ok(None);
        }
        if self.controls.is_instrument_locked(base.instrument()).await? {
            info!(instrument = %base.instrument(), "Instrument locked, not placing stop-loss");
            return Ok(None);
        }
        let contract = order.futures_contract()?;
        if !self.broker.is_contract_tradeable(&contract).await? {
            info!(contract = %contract, "Market closed, stop-loss will be placed later");
            return Ok(None);
        }

        let remaining = base.trade().checked_sub(base.fill())?;
        let limit = self
            .controls
            .what_trade_is_possible(&base.instrument_strategy(), &remaining)
            .await?;
        let sized = remaining.scaled_to_abs_limit(limit);
        if sized.equals_zero() {
            debug!(order_id = ?base.order_id(), %remaining, "Nothing left to trade after limits");
            return Ok(None);
        }
        if sized != remaining {
            info!(
                order_id = ?base.order_id(),
                requested = %remaining,
                %sized,
                "Stop-loss scaled down by trade limits"
            );
        }

        let sized_base = base
            .clone()
            .with_fill(sized.zero_like(), None, None)?
            .with_trade(sized)?;
        Ok(Some(order.clone().with_base(sized_base)))
    }

    /// Compensation when a placed broker order cannot be linked to its
    /// parent: cancel it at the broker and remove what was written.
    async fn undo_stop_loss_dispatch(
        &self,
        order_id: OrderId,
        broker_order_id: OrderId,
        placed: &OrderWithControls,
        newly_created: bool,
        link_err: StackError,
    ) -> StackHandlerError {
        let cancelled = self.broker.cancel_order(&placed.order).await;
        let parent_ids = if newly_created { vec![order_id] } else { Vec::new() };
        if let Err(err) = rollback_parents_and_children(
            &self.stacks.stop_loss_contract,
            &self.stacks.stop_loss_broker,
            &parent_ids,
            &[broker_order_id],
        )
        .await
        {
            return err;
        }
        if !newly_created && let Err(e) = self.stacks.stop_loss_contract.unlock(order_id).await {
            return escalate(
                "stop_loss_dispatch",
                StackHandlerError::stack_corrupted(format!("can't release stop-loss after rollback: {e}"))
                    .with_context("order_id", order_id),
            );
        }
        if let Err(e) = cancelled {
            return escalate(
                "stop_loss_dispatch",
                StackHandlerError::stack_corrupted(format!(
                    "unlinked stop-loss still live at broker: {e}"
                ))
                .with_context("order_id", order_id)
                .with_context("control_ref", &placed.control_ref),
            );
        }

        record_rollback(self.stacks.stop_loss_contract.name());
        warn!(
            order_id = %order_id,
            error = %link_err,
            "Couldn't link stop-loss broker order; cancelled and rolled back"
        );
        StackHandlerError::new(
            ErrorCode::RecoverableRollback,
            format!("could not link stop-loss broker order: {link_err}"),
        )
        .with_context("order_id", order_id)
    }
}
