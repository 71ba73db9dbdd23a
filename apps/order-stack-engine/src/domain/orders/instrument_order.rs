//! Strategy-level orders.

use serde::{Deserialize, Serialize};

use super::StackOrder;
use super::base::{OrderBase, OrderType};
use crate::domain::shared::{InstrumentCode, StrategyName, TradeQuantity};

/// A strategy's request to trade one instrument, before it is split into
/// contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentOrder {
    base: OrderBase,
}

impl InstrumentOrder {
    /// New outright instrument order.
    #[must_use]
    pub fn new(
        strategy: impl Into<StrategyName>,
        instrument: impl Into<InstrumentCode>,
        trade: i64,
        order_type: OrderType,
    ) -> Self {
        Self {
            base: OrderBase::new(strategy, instrument, TradeQuantity::single(trade), order_type),
        }
    }
}

impl StackOrder for InstrumentOrder {
    const LEVEL: &'static str = "instrument";

    fn base(&self) -> &OrderBase {
        &self.base
    }

    fn with_base(mut self, base: OrderBase) -> Self {
        self.base = base;
        self
    }

    fn order_key(&self) -> String {
        format!("{}/{}", self.base.strategy(), self.base.instrument())
    }
}
