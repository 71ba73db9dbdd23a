//! Fields shared by orders at every hierarchy level.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::OrderError;
use crate::domain::shared::{InstrumentCode, InstrumentStrategy, OrderId, StrategyName, TradeQuantity};

/// How an order is to be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Let the execution algo decide.
    #[default]
    Best,
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop order, triggered at a stop price.
    Stop,
}

/// Common order state.
///
/// Every mutator returns a new value; the stack stores whichever version was
/// written last. `fill` never exceeds `trade` on any leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBase {
    order_id: Option<OrderId>,
    strategy: StrategyName,
    instrument: InstrumentCode,
    trade: TradeQuantity,
    fill: TradeQuantity,
    filled_price: Option<Decimal>,
    fill_datetime: Option<DateTime<Utc>>,
    parent: Option<OrderId>,
    children: Vec<OrderId>,
    active: bool,
    locked: bool,
    order_type: OrderType,
}

impl OrderBase {
    /// New unfilled, unlocked, active order without relations.
    #[must_use]
    pub fn new(
        strategy: impl Into<StrategyName>,
        instrument: impl Into<InstrumentCode>,
        trade: TradeQuantity,
        order_type: OrderType,
    ) -> Self {
        let fill = trade.zero_like();
        Self {
            order_id: None,
            strategy: strategy.into(),
            instrument: instrument.into(),
            trade,
            fill,
            filled_price: None,
            fill_datetime: None,
            parent: None,
            children: Vec::new(),
            active: true,
            locked: false,
            order_type,
        }
    }

    /// Stack-assigned id, `None` until first put.
    #[must_use]
    pub const fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Owning strategy.
    #[must_use]
    pub const fn strategy(&self) -> &StrategyName {
        &self.strategy
    }

    /// Instrument traded.
    #[must_use]
    pub const fn instrument(&self) -> &InstrumentCode {
        &self.instrument
    }

    /// Key used for positions, limits and overrides.
    #[must_use]
    pub fn instrument_strategy(&self) -> InstrumentStrategy {
        InstrumentStrategy::new(self.strategy.clone(), self.instrument.clone())
    }

    /// Requested quantity.
    #[must_use]
    pub const fn trade(&self) -> &TradeQuantity {
        &self.trade
    }

    /// Filled quantity.
    #[must_use]
    pub const fn fill(&self) -> &TradeQuantity {
        &self.fill
    }

    /// Average fill price, if anything has filled.
    #[must_use]
    pub const fn filled_price(&self) -> Option<Decimal> {
        self.filled_price
    }

    /// Time of the most recent fill.
    #[must_use]
    pub const fn fill_datetime(&self) -> Option<DateTime<Utc>> {
        self.fill_datetime
    }

    /// Parent id, `None` for root orders.
    #[must_use]
    pub const fn parent(&self) -> Option<OrderId> {
        self.parent
    }

    /// Child ids.
    #[must_use]
    pub fn children(&self) -> &[OrderId] {
        &self.children
    }

    /// True when at least one child is linked.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// False once logically deleted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// True while an executing agent owns the order.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Execution style.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// True when every leg is completely filled.
    #[must_use]
    pub fn fill_equals_trade(&self) -> bool {
        self.fill == self.trade
    }

    /// True when nothing has filled.
    #[must_use]
    pub fn fill_equals_zero(&self) -> bool {
        self.fill.equals_zero()
    }

    /// Open quantity, `trade - fill`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Domain` when the stored fill has a different shape.
    pub fn remaining(&self) -> Result<TradeQuantity, OrderError> {
        Ok(self.trade.checked_sub(&self.fill)?)
    }

    /// Copy with the given id.
    #[must_use]
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Copy with the given parent.
    #[must_use]
    pub fn with_parent(mut self, parent: OrderId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Copy with a new execution style.
    #[must_use]
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    /// Copy with the fill replaced.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::FillExceedsTrade` if `fill` is larger than the
    /// trade on any leg, or has a different shape.
    pub fn with_fill(
        mut self,
        fill: TradeQuantity,
        filled_price: Option<Decimal>,
        fill_datetime: Option<DateTime<Utc>>,
    ) -> Result<Self, OrderError> {
        if self.trade.is_exceeded_by(&fill) {
            return Err(OrderError::FillExceedsTrade {
                trade: self.trade,
                fill,
            });
        }
        self.fill = fill;
        self.filled_price = filled_price;
        self.fill_datetime = fill_datetime;
        Ok(self)
    }

    /// Copy with the requested trade replaced.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::FillExceedsTrade` if the existing fill would exceed
    /// the new trade.
    pub fn with_trade(mut self, trade: TradeQuantity) -> Result<Self, OrderError> {
        if !self.fill.equals_zero() && trade.is_exceeded_by(&self.fill) {
            return Err(OrderError::FillExceedsTrade {
                trade,
                fill: self.fill,
            });
        }
        if self.fill.len() != trade.len() {
            self.fill = trade.zero_like();
        }
        self.trade = trade;
        Ok(self)
    }

    /// Copy marked inactive.
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Copy with the lock set.
    #[must_use]
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Copy with the lock released.
    #[must_use]
    pub fn unlocked(mut self) -> Self {
        self.locked = false;
        self
    }

    /// Copy with the first batch of children.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::ChildrenAlreadyPresent` if any child is linked;
    /// later children go through [`Self::with_another_child`].
    pub fn with_children(mut self, children: Vec<OrderId>) -> Result<Self, OrderError> {
        if self.has_children() {
            return Err(OrderError::ChildrenAlreadyPresent {
                existing: self.children.len(),
            });
        }
        self.children = children;
        Ok(self)
    }

    /// Copy with one more child appended.
    #[must_use]
    pub fn with_another_child(mut self, child: OrderId) -> Self {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(trade: i64) -> OrderBase {
        OrderBase::new("trend", "GOLD", TradeQuantity::single(trade), OrderType::Best)
    }

    #[test]
    fn new_order_is_active_unfilled_and_unlocked() {
        let o = order(10);
        assert!(o.is_active());
        assert!(!o.is_locked());
        assert!(o.fill_equals_zero());
        assert_eq!(o.order_id(), None);
        assert_eq!(o.instrument_strategy().key(), "trend/GOLD");
    }

    #[test]
    fn with_fill_rejects_overfill_and_keeps_original() {
        let o = order(10);
        let err = o
            .clone()
            .with_fill(TradeQuantity::single(12), Some(dec!(100)), None)
            .unwrap_err();
        assert!(matches!(err, OrderError::FillExceedsTrade { .. }));
        assert!(o.fill_equals_zero());

        let filled = o
            .with_fill(TradeQuantity::single(10), Some(dec!(100)), Some(Utc::now()))
            .unwrap();
        assert!(filled.fill_equals_trade());
        assert_eq!(filled.filled_price(), Some(dec!(100)));
    }

    #[test]
    fn with_trade_keeps_fill_within_bounds() {
        let o = order(-10)
            .with_fill(TradeQuantity::single(-6), Some(dec!(95)), None)
            .unwrap();
        assert!(o.clone().with_trade(TradeQuantity::single(-5)).is_err());
        let resized = o.with_trade(TradeQuantity::single(-8)).unwrap();
        assert_eq!(resized.trade(), &TradeQuantity::single(-8));
        assert_eq!(resized.fill(), &TradeQuantity::single(-6));
    }

    #[test]
    fn children_are_set_once_then_appended() {
        let o = order(1)
            .with_children(vec![OrderId::new(1), OrderId::new(2)])
            .unwrap();
        assert!(matches!(
            o.clone().with_children(vec![OrderId::new(3)]),
            Err(OrderError::ChildrenAlreadyPresent { existing: 2 })
        ));
        let o = o.with_another_child(OrderId::new(3)).with_another_child(OrderId::new(3));
        assert_eq!(o.children().len(), 3);
    }

    #[test]
    fn lock_and_deactivate_round_trip() {
        let o = order(1).locked();
        assert!(o.is_locked());
        let o = o.unlocked().deactivated();
        assert!(!o.is_locked());
        assert!(!o.is_active());
    }
}
