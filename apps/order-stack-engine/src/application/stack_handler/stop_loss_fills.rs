//! Stop-loss hierarchy fills: positions, then the stop-loss override and its
//! delay days.

use tracing::info;

use super::{Hierarchy, StackHandler};
use crate::domain::controls::{DelayDays, Override};
use crate::domain::orders::{ContractOrder, StackOrder};
use crate::error::StackHandlerError;

impl StackHandler {
    /// Pass fills from the stop-loss broker stack up to the stop-loss
    /// contract stack. Each new fill also sets the stop-loss override.
    ///
    /// # Errors
    ///
    /// Only failures to list a stack are returned.
    pub async fn process_fills_stop_loss_stack(&self) -> Result<(), StackHandlerError> {
        self.pass_fills_from_broker_to_broker_stack(Hierarchy::StopLoss)
            .await?;
        self.pass_fills_from_broker_up_to_contract(Hierarchy::StopLoss)
            .await
    }

    /// Block further position increases for the order's (instrument,
    /// strategy) and start its delay-days countdown.
    ///
    /// # Errors
    ///
    /// `STACK_CORRUPTED` if the override cannot be written or read back,
    /// `CONFIGURATION_MISSING` if neither the order nor config carry delay
    /// days.
    pub(crate) async fn set_stop_loss_override_for_order(
        &self,
        order: &ContractOrder,
    ) -> Result<(), StackHandlerError> {
        let instrument_strategy = order.base().instrument_strategy();
        let override_key = instrument_strategy.key();

        self.overrides
            .set_override(&override_key, Override::StopLossOverride)
            .await
            .map_err(|e| {
                StackHandlerError::stack_corrupted(format!("can't set stop-loss override: {e}"))
                    .with_context("override_key", &override_key)
            })?;

        let stored = self.overrides.get_override(&override_key).await.map_err(|e| {
            StackHandlerError::stack_corrupted(format!("can't read back override: {e}"))
                .with_context("override_key", &override_key)
        })?;
        if !stored.is_some_and(Override::is_stop_loss) {
            return Err(StackHandlerError::stack_corrupted(
                "stop-loss override record not found after writing it",
            )
            .with_context("override_key", &override_key));
        }

        let days = order
            .stop_loss_info()
            .delay_days
            .or(self.stop_loss_config.delay_days_after_stop_loss)
            .ok_or_else(|| {
                StackHandlerError::configuration_missing("stop_loss.delay_days_after_stop_loss")
                    .with_context("override_key", &override_key)
            })?;
        let delay = DelayDays::new(days);
        self.delay_days
            .set_delay_days_for_stop_loss_override(&override_key, delay)
            .await
            .map_err(|e| {
                StackHandlerError::stack_corrupted(format!("can't set delay days: {e}"))
                    .with_context("override_key", &override_key)
            })?;

        info!(
            instrument = %instrument_strategy.instrument,
            strategy = %instrument_strategy.strategy,
            delay_days = %delay,
            "Stop-loss filled, override set"
        );
        Ok(())
    }
}
