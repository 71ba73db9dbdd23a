//! Stop-loss decision engine.
//!
//! Decides, for a contract order that has just filled completely, whether a
//! catastrophic stop-loss must be created, resized or left alone.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::{StackHandler, escalate, log_step_failure};
use crate::domain::orders::{AttachStopLoss, ContractOrder, OrderType, StackOrder, StopLossInfo};
use crate::domain::shared::{FuturesContract, OrderId, StrategyName, TradeQuantity};
use crate::error::{ErrorCode, StackHandlerError};

/// What the decision engine did about one filled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopLossAction {
    /// A new stop-loss contract order was put on the stack. `broker_order_id`
    /// is `None` when gating held it back from the broker.
    Created {
        /// Stop-loss contract order id.
        order_id: OrderId,
        /// Broker order placed for it, if any.
        broker_order_id: Option<OrderId>,
    },
    /// An existing stop-loss was resized.
    Resized {
        /// Stop-loss contract order id.
        order_id: OrderId,
        /// Trade after the resize.
        trade: TradeQuantity,
    },
    /// An existing stop-loss was resized to zero and retired.
    Cancelled {
        /// Stop-loss contract order id.
        order_id: OrderId,
    },
}

impl StackHandler {
    /// Run the decision engine over every fully filled contract order not yet
    /// handled.
    ///
    /// Inactive orders are included, so families retired during the fill pass
    /// are still seen. An order is marked handled only when the engine
    /// succeeded on it.
    ///
    /// # Errors
    ///
    /// Only failures to list the contract stack are returned.
    pub async fn create_stop_loss_orders_from_fills(&self) -> Result<Vec<StopLossAction>, StackHandlerError> {
        let mut actions = Vec::new();
        for order in self.stacks.contract.list_orders(false).await? {
            let base = order.base();
            if order.is_stop_loss_processed() || base.fill_equals_zero() || !base.fill_equals_trade() {
                continue;
            }
            let Some(order_id) = base.order_id() else {
                continue;
            };

            match self.handle_stop_loss_for_filled_contract_order(&order).await {
                Ok(mut taken) => {
                    actions.append(&mut taken);
                    if let Err(err) = self.mark_stop_loss_processed(order_id).await {
                        log_step_failure("create_stop_losses", &err);
                    }
                }
                Err(err) => log_step_failure("create_stop_losses", &err),
            }
        }
        Ok(actions)
    }

    async fn mark_stop_loss_processed(&self, order_id: OrderId) -> Result<(), StackHandlerError> {
        let order = self.stacks.contract.get_or_not_found(order_id).await?;
        self.stacks
            .contract
            .replace_order(&order.with_stop_loss_processed())
            .await?;
        Ok(())
    }

    /// Decide and apply the stop-loss action for one filled contract order.
    ///
    /// # Errors
    ///
    /// Fatal `INVALID_CONFIGURATION` for a sign mismatch or a resize without
    /// `change_order_by`; fatal `CONFIGURATION_MISSING` when level or delay
    /// days cannot be resolved; `STACK_CORRUPTED` when existing stop-losses
    /// are inconsistent. Creation and resize errors propagate.
    pub async fn handle_stop_loss_for_filled_contract_order(
        &self,
        filled_order: &ContractOrder,
    ) -> Result<Vec<StopLossAction>, StackHandlerError> {
        match filled_order.stop_loss_info().attach_stop_loss {
            AttachStopLoss::NoStopLoss => Ok(Vec::new()),
            AttachStopLoss::ChangeExistingOrder => self.resize_stop_loss_for_fill(filled_order).await,
            AttachStopLoss::NewOrder if filled_order.is_roll_order() && filled_order.base().trade().is_spread() => {
                self.new_stop_loss_for_spread_roll(filled_order).await
            }
            AttachStopLoss::NewOrder => self.new_stop_loss_for_fill(filled_order).await,
        }
    }

    /// The single active stop-loss for a contract and strategy.
    ///
    /// # Errors
    ///
    /// `STACK_CORRUPTED` when more than one exists.
    pub async fn find_stop_loss_contract_order_for_contract(
        &self,
        contract: &FuturesContract,
        strategy: &StrategyName,
    ) -> Result<Option<ContractOrder>, StackHandlerError> {
        let mut matching: Vec<ContractOrder> = self
            .stacks
            .stop_loss_contract
            .list_orders(true)
            .await?
            .into_iter()
            .filter(|o| {
                o.base().strategy() == strategy
                    && o.base().instrument() == &contract.instrument
                    && o.contract_dates() == std::slice::from_ref(&contract.contract_date)
            })
            .collect();

        match matching.len() {
            0 | 1 => Ok(matching.pop()),
            n => Err(escalate(
                "find_stop_loss",
                StackHandlerError::stack_corrupted(format!(
                    "{n} active stop-loss orders for one contract"
                ))
                .with_context("contract", contract)
                .with_context("strategy", strategy),
            )),
        }
    }

    async fn resize_stop_loss_for_fill(
        &self,
        filled_order: &ContractOrder,
    ) -> Result<Vec<StopLossAction>, StackHandlerError> {
        let contract = leg_contract(filled_order, 0)?;
        let strategy = filled_order.base().strategy();
        if !filled_order.is_roll_order() && self.stop_loss_is_correctly_sized(&contract, strategy).await? {
            debug!(contract = %contract, strategy = %strategy, "Stop-loss already sized to position");
            return Ok(Vec::new());
        }

        let change_by = filled_order.stop_loss_info().change_order_by.ok_or_else(|| {
            escalate(
                "stop_loss_decision",
                StackHandlerError::invalid_configuration("CHANGE_EXISTING_ORDER without change_order_by")
                    .with_context("key", filled_order.order_key()),
            )
        })?;

        let Some(existing) = self
            .find_stop_loss_contract_order_for_contract(&contract, strategy)
            .await?
        else {
            warn!(
                contract = %contract,
                strategy = %strategy,
                change_by,
                "No existing stop-loss to change"
            );
            return Ok(Vec::new());
        };

        Ok(vec![
            self.change_existing_stop_loss_order_size(&existing, change_by)
                .await?,
        ])
    }

    async fn new_stop_loss_for_fill(
        &self,
        filled_order: &ContractOrder,
    ) -> Result<Vec<StopLossAction>, StackHandlerError> {
        let contract = filled_order.futures_contract()?;
        let strategy = filled_order.base().strategy();
        if self.stop_loss_is_correctly_sized(&contract, strategy).await? {
            debug!(contract = %contract, strategy = %strategy, "Stop-loss already sized to position");
            return Ok(Vec::new());
        }

        let (level, delay_days) = self.resolve_stop_loss_parameters(filled_order.stop_loss_info())?;
        let fill = filled_order.base().fill().as_single_trade_qty_or_error()?;
        let trade = new_stop_loss_trade(filled_order.stop_loss_info().change_order_by, fill)
            .map_err(|e| escalate("stop_loss_decision", e.with_context("key", filled_order.order_key())))?;

        // The old stop goes even when no new one is placed: left alone on a
        // flat or reversed position it would open exposure when triggered.
        let mut actions = Vec::new();
        if let Some(existing) = self
            .find_stop_loss_contract_order_for_contract(&contract, strategy)
            .await?
        {
            actions.push(self.cancel_stop_loss_order(&existing).await?);
        }

        if !self.stop_loss_opposes_position(&contract, trade).await? {
            return Ok(actions);
        }
        let fill_price = filled_price(filled_order)?;

        let stop_order = stop_loss_order(strategy, &contract, trade, fill_price, level, delay_days);
        actions.push(self.create_and_send_new_stop_loss_order(stop_order).await?);
        Ok(actions)
    }

    /// Spread roll: drop protection on the old leg and protect the forward
    /// leg at the price it actually filled at.
    async fn new_stop_loss_for_spread_roll(
        &self,
        roll_order: &ContractOrder,
    ) -> Result<Vec<StopLossAction>, StackHandlerError> {
        let priced_contract = leg_contract(roll_order, 0)?;
        let forward_contract = leg_contract(roll_order, 1)?;
        let strategy = roll_order.base().strategy();

        let mut actions = Vec::new();
        if let Some(existing) = self
            .find_stop_loss_contract_order_for_contract(&priced_contract, strategy)
            .await?
        {
            actions.push(self.cancel_stop_loss_order(&existing).await?);
        }
        if self
            .find_stop_loss_contract_order_for_contract(&forward_contract, strategy)
            .await?
            .is_some()
        {
            return Ok(actions);
        }

        let forward_fill = roll_order.base().fill().leg(1).unwrap_or(0);
        if forward_fill == 0 {
            return Err(escalate(
                "stop_loss_decision",
                StackHandlerError::invalid_configuration("roll order has no forward leg fill")
                    .with_context("key", roll_order.order_key()),
            ));
        }

        let (level, delay_days) = self.resolve_stop_loss_parameters(roll_order.stop_loss_info())?;
        let trade = new_stop_loss_trade(roll_order.stop_loss_info().change_order_by, forward_fill)
            .map_err(|e| escalate("stop_loss_decision", e.with_context("key", roll_order.order_key())))?;
        if !self.stop_loss_opposes_position(&forward_contract, trade).await? {
            return Ok(actions);
        }
        let fill_price = self.forward_leg_fill_price(roll_order, forward_fill).await?;

        let stop_order = stop_loss_order(strategy, &forward_contract, trade, fill_price, level, delay_days);
        actions.push(self.create_and_send_new_stop_loss_order(stop_order).await?);
        Ok(actions)
    }

    /// Most conservative forward-leg price over the roll's broker fills: the
    /// lowest for a forward buy, the highest for a forward sell.
    async fn forward_leg_fill_price(
        &self,
        roll_order: &ContractOrder,
        forward_fill: i64,
    ) -> Result<Decimal, StackHandlerError> {
        let children = self
            .stacks
            .broker
            .get_list_from_ids(roll_order.base().children())
            .await?;
        let prices = children
            .orders()
            .iter()
            .filter_map(|child| child.leg_filled_prices().get(1).copied());
        let price = if forward_fill > 0 { prices.min() } else { prices.max() };
        price.ok_or_else(|| {
            escalate(
                "stop_loss_decision",
                StackHandlerError::stack_corrupted("filled roll order has no forward leg fill prices")
                    .with_context("key", roll_order.order_key()),
            )
        })
    }

    /// True when the active stop-loss trades exactly against the current
    /// position.
    async fn stop_loss_is_correctly_sized(
        &self,
        contract: &FuturesContract,
        strategy: &StrategyName,
    ) -> Result<bool, StackHandlerError> {
        let Some(existing) = self
            .find_stop_loss_contract_order_for_contract(contract, strategy)
            .await?
        else {
            return Ok(false);
        };
        let position = self.positions.current_position(contract).await?;
        Ok(position != 0 && existing.base().trade() == &TradeQuantity::single(-position))
    }

    async fn stop_loss_opposes_position(
        &self,
        contract: &FuturesContract,
        stop_trade: i64,
    ) -> Result<bool, StackHandlerError> {
        let position = self.positions.current_position(contract).await?;
        if position != 0 && stop_trade.signum() == -position.signum() {
            return Ok(true);
        }
        warn!(
            contract = %contract,
            position,
            stop_trade,
            "Stop-loss would not reduce the position, not creating it"
        );
        Ok(false)
    }

    fn resolve_stop_loss_parameters(&self, info: &StopLossInfo) -> Result<(Decimal, u32), StackHandlerError> {
        let level = info
            .stop_loss_level
            .or(self.stop_loss_config.catastrophic_level)
            .ok_or_else(|| {
                escalate(
                    "stop_loss_decision",
                    StackHandlerError::configuration_missing("stop_loss.catastrophic_level"),
                )
            })?;
        let delay_days = info
            .delay_days
            .or(self.stop_loss_config.delay_days_after_stop_loss)
            .ok_or_else(|| {
                escalate(
                    "stop_loss_decision",
                    StackHandlerError::configuration_missing("stop_loss.delay_days_after_stop_loss"),
                )
            })?;
        Ok((level, delay_days))
    }
}

/// Size of a new stop-loss for a fill: the closing quantity, capped by
/// `change_order_by` when one is given.
///
/// # Errors
///
/// `INVALID_CONFIGURATION` when `change_order_by` points the same way as the
/// fill.
pub(crate) fn new_stop_loss_trade(change_order_by: Option<i64>, fill: i64) -> Result<i64, StackHandlerError> {
    let closing = -fill;
    match change_order_by {
        None | Some(0) => Ok(closing),
        Some(change) if change.signum() != closing.signum() => Err(StackHandlerError::invalid_configuration(
            format!("change_order_by {change} does not close a fill of {fill}"),
        )),
        Some(change) if change.abs() < closing.abs() => Ok(change),
        Some(_) => Ok(closing),
    }
}

/// Stop price `level` away from `fill_price`, on the losing side of the
/// position the stop protects.
pub(crate) fn stop_price_for(fill_price: Decimal, stop_trade: i64, level: Decimal) -> Decimal {
    if stop_trade < 0 {
        fill_price * (Decimal::ONE - level)
    } else {
        fill_price * (Decimal::ONE + level)
    }
}

fn stop_loss_order(
    strategy: &StrategyName,
    contract: &FuturesContract,
    trade: i64,
    fill_price: Decimal,
    level: Decimal,
    delay_days: u32,
) -> ContractOrder {
    ContractOrder::outright(strategy.clone(), contract, trade, OrderType::Stop)
        .with_stop_price(stop_price_for(fill_price, trade, level))
        .with_stop_loss_info(StopLossInfo::new_order(Some(level), Some(delay_days)))
}

fn leg_contract(order: &ContractOrder, leg: usize) -> Result<FuturesContract, StackHandlerError> {
    order.futures_contract_for_leg(leg).ok_or_else(|| {
        StackHandlerError::new(ErrorCode::InvalidOrder, format!("order has no leg {leg}"))
            .with_context("key", order.order_key())
    })
}

fn filled_price(order: &ContractOrder) -> Result<Decimal, StackHandlerError> {
    order.base().filled_price().ok_or_else(|| {
        escalate(
            "stop_loss_decision",
            StackHandlerError::stack_corrupted("filled order has no fill price")
                .with_context("key", order.order_key()),
        )
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;
    use crate::application::stack_handler::test_support::{Fixture, config, fixture, fixture_with};
    use crate::domain::orders::{BrokerOrder, ROLL_PSEUDO_STRATEGY};

    fn contract() -> FuturesContract {
        FuturesContract::new("GOLD", "20240600")
    }

    /// A contract order on the normal stack, filled in full at `price`.
    async fn filled_order(fixture: &Fixture, trade: i64, price: Decimal, info: StopLossInfo) -> ContractOrder {
        let order = ContractOrder::outright("trend", &contract(), trade, OrderType::Market).with_stop_loss_info(info);
        let stack = &fixture.handler.stacks().contract;
        let order_id = stack.put(order).await.unwrap();
        stack
            .change_fill_qty(order_id, TradeQuantity::single(trade), Some(price), None)
            .await
            .unwrap()
    }

    #[test_case(None, -10, Some(10) ; "no cap closes the fill")]
    #[test_case(Some(0), -10, Some(10) ; "zero cap closes the fill")]
    #[test_case(Some(-4), 10, Some(-4) ; "smaller cap wins")]
    #[test_case(Some(-15), 10, Some(-10) ; "larger cap is ignored")]
    #[test_case(Some(-10), 10, Some(-10) ; "equal magnitude")]
    #[test_case(Some(5), 10, None ; "same direction is rejected")]
    fn stop_loss_trade_sizing(change_by: Option<i64>, fill: i64, expected: Option<i64>) {
        assert_eq!(new_stop_loss_trade(change_by, fill).ok(), expected);
    }

    #[test]
    fn sign_mismatch_is_fatal() {
        let err = new_stop_loss_trade(Some(3), 10).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
        assert!(err.is_fatal());
    }

    #[test]
    fn stop_price_sits_against_the_position() {
        assert_eq!(stop_price_for(dec!(100), -10, dec!(0.05)), dec!(95));
        assert_eq!(stop_price_for(dec!(100), 10, dec!(0.05)), dec!(105));
    }

    #[tokio::test]
    async fn long_fill_creates_sell_stop_below_price() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        let filled = filled_order(&fixture, 10, dec!(100), StopLossInfo::new_order(Some(dec!(0.05)), Some(3))).await;

        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&filled)
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        let StopLossAction::Created { order_id, broker_order_id } = actions[0].clone() else {
            panic!("expected a created stop-loss, got {actions:?}");
        };
        assert!(broker_order_id.is_some());

        let stop = fixture
            .handler
            .stacks()
            .stop_loss_contract
            .get_or_not_found(order_id)
            .await
            .unwrap();
        assert_eq!(stop.base().trade(), &TradeQuantity::single(-10));
        assert_eq!(stop.stop_price(), Some(dec!(95)));
        assert_eq!(stop.base().order_type(), OrderType::Stop);
        assert!(!stop.base().is_locked());
    }

    #[tokio::test]
    async fn repeated_runs_leave_one_active_stop() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        let filled = filled_order(&fixture, 10, dec!(100), StopLossInfo::new_order(None, None)).await;

        for _ in 0..3 {
            fixture
                .handler
                .handle_stop_loss_for_filled_contract_order(&filled)
                .await
                .unwrap();
        }
        assert_eq!(fixture.handler.stacks().stop_loss_contract.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bigger_position_replaces_existing_stop() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 5).await;
        let first = filled_order(&fixture, 5, dec!(100), StopLossInfo::new_order(None, None)).await;
        fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&first)
            .await
            .unwrap();

        fixture.positions.set_contract_position(contract(), 12).await;
        let second = filled_order(&fixture, 7, dec!(110), StopLossInfo::new_order(None, None)).await;
        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&second)
            .await
            .unwrap();

        assert!(matches!(actions[0], StopLossAction::Cancelled { .. }));
        assert!(matches!(actions[1], StopLossAction::Created { .. }));
        let active = fixture.handler.stacks().stop_loss_contract.list_orders(true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].base().trade(), &TradeQuantity::single(-7));
        assert_eq!(fixture.broker.cancelled_refs().await.len(), 1);
    }

    #[tokio::test]
    async fn change_existing_resizes_without_moving_price() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        let opening = filled_order(&fixture, 10, dec!(100), StopLossInfo::new_order(None, None)).await;
        fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&opening)
            .await
            .unwrap();

        fixture.positions.set_contract_position(contract(), 5).await;
        let reducing = filled_order(&fixture, -5, dec!(102), StopLossInfo::change_existing_order(5)).await;
        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&reducing)
            .await
            .unwrap();

        let StopLossAction::Resized { order_id, trade } = actions[0].clone() else {
            panic!("expected a resize, got {actions:?}");
        };
        assert_eq!(trade, TradeQuantity::single(-5));
        let stop = fixture
            .handler
            .stacks()
            .stop_loss_contract
            .get_or_not_found(order_id)
            .await
            .unwrap();
        assert_eq!(stop.base().trade(), &TradeQuantity::single(-5));
        assert_eq!(stop.stop_price(), Some(dec!(95)));
    }

    #[tokio::test]
    async fn fill_to_flat_cancels_old_stop_without_replacing_it() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        let opening = filled_order(&fixture, 10, dec!(100), StopLossInfo::new_order(None, None)).await;
        fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&opening)
            .await
            .unwrap();

        fixture.positions.set_contract_position(contract(), 0).await;
        let closing = filled_order(&fixture, -10, dec!(101), StopLossInfo::new_order(None, None)).await;
        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&closing)
            .await
            .unwrap();

        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], StopLossAction::Cancelled { .. }));
        assert_eq!(fixture.handler.stacks().stop_loss_contract.count_active().await.unwrap(), 0);
        assert_eq!(fixture.broker.cancelled_refs().await.len(), 1);
    }

    /// A filled outright roll order on the normal stack.
    async fn filled_roll(fixture: &Fixture, trade: i64, info: StopLossInfo) -> ContractOrder {
        let order =
            ContractOrder::outright(ROLL_PSEUDO_STRATEGY, &contract(), trade, OrderType::Market).with_stop_loss_info(info);
        let stack = &fixture.handler.stacks().contract;
        let order_id = stack.put(order).await.unwrap();
        stack
            .change_fill_qty(order_id, TradeQuantity::single(trade), Some(dec!(100)), None)
            .await
            .unwrap()
    }

    async fn placed_roll_stop(fixture: &Fixture, trade: i64) -> OrderId {
        let stop = ContractOrder::outright(ROLL_PSEUDO_STRATEGY, &contract(), trade, OrderType::Stop)
            .with_stop_price(dec!(95));
        let StopLossAction::Created { order_id, .. } = fixture
            .handler
            .create_and_send_new_stop_loss_order(stop)
            .await
            .unwrap()
        else {
            panic!("expected a created stop-loss");
        };
        order_id
    }

    #[tokio::test]
    async fn outright_roll_creates_stop_when_none_exists() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        let roll = filled_roll(&fixture, 10, StopLossInfo::new_order(None, None)).await;

        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&roll)
            .await
            .unwrap();

        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], StopLossAction::Created { .. }));
        let stop = fixture
            .handler
            .find_stop_loss_contract_order_for_contract(&contract(), &StrategyName::new(ROLL_PSEUDO_STRATEGY))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stop.base().trade(), &TradeQuantity::single(-10));
        assert_eq!(stop.stop_price(), Some(dec!(95)));
    }

    #[tokio::test]
    async fn outright_roll_leaves_exact_size_stop_alone() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        placed_roll_stop(&fixture, -10).await;
        let roll = filled_roll(&fixture, 10, StopLossInfo::new_order(None, None)).await;

        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&roll)
            .await
            .unwrap();

        assert!(actions.is_empty());
        assert_eq!(fixture.handler.stacks().stop_loss_contract.count_active().await.unwrap(), 1);
        assert!(fixture.broker.cancelled_refs().await.is_empty());
    }

    #[tokio::test]
    async fn roll_change_existing_resizes_even_when_sized_to_position() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        let stop_id = placed_roll_stop(&fixture, -10).await;
        let roll = filled_roll(&fixture, -4, StopLossInfo::change_existing_order(4)).await;

        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&roll)
            .await
            .unwrap();

        assert_eq!(
            actions,
            vec![StopLossAction::Resized {
                order_id: stop_id,
                trade: TradeQuantity::single(-6),
            }]
        );
    }

    #[tokio::test]
    async fn roll_closing_out_the_old_contract_retires_its_stop() {
        let fixture = fixture();
        let stop_id = placed_roll_stop(&fixture, -10).await;
        let roll = filled_roll(&fixture, -10, StopLossInfo::change_existing_order(10)).await;

        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&roll)
            .await
            .unwrap();

        assert_eq!(actions, vec![StopLossAction::Cancelled { order_id: stop_id }]);
        assert_eq!(fixture.handler.stacks().stop_loss_contract.count_active().await.unwrap(), 0);
        assert_eq!(fixture.broker.cancelled_refs().await.len(), 1);
    }

    #[tokio::test]
    async fn change_existing_without_delta_is_fatal() {
        let fixture = fixture();
        let mut info = StopLossInfo::change_existing_order(5);
        info.change_order_by = None;
        let filled = filled_order(&fixture, -5, dec!(100), info).await;
        let err = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&filled)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[tokio::test]
    async fn missing_level_is_configuration_missing() {
        let mut config = config();
        config.stop_loss.catastrophic_level = None;
        let fixture = fixture_with(&config);
        fixture.positions.set_contract_position(contract(), 10).await;
        let filled = filled_order(&fixture, 10, dec!(100), StopLossInfo::new_order(None, Some(2))).await;
        let err = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&filled)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationMissing);
        assert_eq!(fixture.handler.stacks().stop_loss_contract.count_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stop_that_would_add_to_position_is_skipped() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), -3).await;
        let filled = filled_order(&fixture, 10, dec!(100), StopLossInfo::new_order(None, None)).await;
        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&filled)
            .await
            .unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn no_stop_loss_does_nothing() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        let filled = filled_order(&fixture, 10, dec!(100), StopLossInfo::no_stop_loss()).await;
        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&filled)
            .await
            .unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn spread_roll_moves_protection_to_forward_leg() {
        let fixture = fixture();
        let old = contract();
        let forward = FuturesContract::new("GOLD", "20240800");
        fixture.positions.set_contract_position(old.clone(), 10).await;

        let existing = ContractOrder::outright(ROLL_PSEUDO_STRATEGY, &old, -10, OrderType::Stop)
            .with_stop_price(dec!(95));
        fixture.handler.stacks().stop_loss_contract.put(existing).await.unwrap();

        let roll = ContractOrder::new(
            ROLL_PSEUDO_STRATEGY,
            "GOLD",
            vec![old.contract_date.clone(), forward.contract_date.clone()],
            TradeQuantity::from_legs(vec![-10, 10]),
            OrderType::Best,
        )
        .unwrap()
        .with_stop_loss_info(StopLossInfo::new_order(None, None));
        let stacks = fixture.handler.stacks();
        let roll_id = stacks.contract.put(roll).await.unwrap();
        let roll = stacks.contract.get_or_not_found(roll_id).await.unwrap();

        let mut child_ids = Vec::new();
        for forward_price in [dec!(101), dec!(99)] {
            let child = BrokerOrder::from_contract_order(
                &roll,
                TradeQuantity::from_legs(vec![-5, 5]),
                OrderType::Best,
                "algo_market",
            )
            .unwrap()
            .with_leg_filled_prices(vec![dec!(100), forward_price]);
            child_ids.push(stacks.broker.put(child).await.unwrap());
        }
        stacks.contract.add_children(roll_id, child_ids).await.unwrap();
        let roll = stacks
            .contract
            .change_fill_qty(roll_id, TradeQuantity::from_legs(vec![-10, 10]), Some(dec!(1)), None)
            .await
            .unwrap();

        fixture.positions.set_contract_position(old.clone(), 0).await;
        fixture.positions.set_contract_position(forward.clone(), 10).await;

        let actions = fixture
            .handler
            .handle_stop_loss_for_filled_contract_order(&roll)
            .await
            .unwrap();
        assert!(matches!(actions[0], StopLossAction::Cancelled { .. }));
        assert!(matches!(actions[1], StopLossAction::Created { .. }));

        let strategy = StrategyName::new(ROLL_PSEUDO_STRATEGY);
        assert!(
            fixture
                .handler
                .find_stop_loss_contract_order_for_contract(&old, &strategy)
                .await
                .unwrap()
                .is_none()
        );
        let new_stop = fixture
            .handler
            .find_stop_loss_contract_order_for_contract(&forward, &strategy)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(new_stop.base().trade(), &TradeQuantity::single(-10));
        assert_eq!(new_stop.stop_price(), Some(dec!(94.05)));
    }

    #[tokio::test]
    async fn two_active_stops_for_one_contract_is_corruption() {
        let fixture = fixture();
        let stack = &fixture.handler.stacks().stop_loss_contract;
        for _ in 0..2 {
            stack
                .put(ContractOrder::outright("trend", &contract(), -10, OrderType::Stop))
                .await
                .unwrap();
        }
        let err = fixture
            .handler
            .find_stop_loss_contract_order_for_contract(&contract(), &StrategyName::new("trend"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StackCorrupted);
    }

    #[tokio::test]
    async fn sweep_marks_filled_orders_once() {
        let fixture = fixture();
        fixture.positions.set_contract_position(contract(), 10).await;
        let filled = filled_order(&fixture, 10, dec!(100), StopLossInfo::new_order(None, None)).await;

        let first = fixture.handler.create_stop_loss_orders_from_fills().await.unwrap();
        assert_eq!(first.len(), 1);
        let second = fixture.handler.create_stop_loss_orders_from_fills().await.unwrap();
        assert!(second.is_empty());

        let stored = fixture
            .handler
            .stacks()
            .contract
            .get_or_not_found(filled.base().order_id().unwrap())
            .await
            .unwrap();
        assert!(stored.is_stop_loss_processed());
    }
}
