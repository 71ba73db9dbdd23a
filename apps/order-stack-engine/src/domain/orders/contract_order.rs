//! Contract-level orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StackOrder;
use super::base::{OrderBase, OrderType};
use super::errors::OrderError;
use super::stop_loss::StopLossInfo;
use crate::domain::shared::{ContractDate, FuturesContract, InstrumentCode, StrategyName, TradeQuantity};

/// Strategy name used for internal roll trades.
pub const ROLL_PSEUDO_STRATEGY: &str = "_ROLL_PSEUDO_STRATEGY";

/// An order for one contract, or one spread across several contracts of the
/// same instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractOrder {
    base: OrderBase,
    contract_dates: Vec<ContractDate>,
    #[serde(default)]
    stop_loss_info: StopLossInfo,
    #[serde(default)]
    stop_price: Option<Decimal>,
    #[serde(default)]
    stop_loss_processed: bool,
}

impl ContractOrder {
    /// New contract order with one contract date per trade leg.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::LegCountMismatch` when the number of dates and
    /// legs differ.
    pub fn new(
        strategy: impl Into<StrategyName>,
        instrument: impl Into<InstrumentCode>,
        contract_dates: Vec<ContractDate>,
        trade: TradeQuantity,
        order_type: OrderType,
    ) -> Result<Self, OrderError> {
        if contract_dates.len() != trade.len() {
            return Err(OrderError::LegCountMismatch {
                dates: contract_dates.len(),
                legs: trade.len(),
            });
        }
        Ok(Self {
            base: OrderBase::new(strategy, instrument, trade, order_type),
            contract_dates,
            stop_loss_info: StopLossInfo::default(),
            stop_price: None,
            stop_loss_processed: false,
        })
    }

    /// Outright order for a single contract.
    #[must_use]
    pub fn outright(
        strategy: impl Into<StrategyName>,
        contract: &FuturesContract,
        trade: i64,
        order_type: OrderType,
    ) -> Self {
        Self {
            base: OrderBase::new(
                strategy,
                contract.instrument.clone(),
                TradeQuantity::single(trade),
                order_type,
            ),
            contract_dates: vec![contract.contract_date.clone()],
            stop_loss_info: StopLossInfo::default(),
            stop_price: None,
            stop_loss_processed: false,
        }
    }

    /// Contract dates, one per leg.
    #[must_use]
    pub fn contract_dates(&self) -> &[ContractDate] {
        &self.contract_dates
    }

    /// The single contract of an outright order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::LegCountMismatch` for spread orders.
    pub fn futures_contract(&self) -> Result<FuturesContract, OrderError> {
        match self.contract_dates.as_slice() {
            [date] => Ok(FuturesContract::new(
                self.base.instrument().clone(),
                date.clone(),
            )),
            dates => Err(OrderError::LegCountMismatch {
                dates: dates.len(),
                legs: 1,
            }),
        }
    }

    /// Contract traded on one leg.
    #[must_use]
    pub fn futures_contract_for_leg(&self, leg: usize) -> Option<FuturesContract> {
        self.contract_dates
            .get(leg)
            .map(|date| FuturesContract::new(self.base.instrument().clone(), date.clone()))
    }

    /// Stop-loss instructions.
    #[must_use]
    pub const fn stop_loss_info(&self) -> &StopLossInfo {
        &self.stop_loss_info
    }

    /// Trigger price for stop orders.
    #[must_use]
    pub const fn stop_price(&self) -> Option<Decimal> {
        self.stop_price
    }

    /// True for internal roll trades.
    #[must_use]
    pub fn is_roll_order(&self) -> bool {
        self.base.strategy().as_str() == ROLL_PSEUDO_STRATEGY
    }

    /// True once the stop-loss consequences of this order's fill were handled.
    #[must_use]
    pub const fn is_stop_loss_processed(&self) -> bool {
        self.stop_loss_processed
    }

    /// Copy marked as handled by the stop-loss engine.
    #[must_use]
    pub fn with_stop_loss_processed(mut self) -> Self {
        self.stop_loss_processed = true;
        self
    }

    /// Copy with new stop-loss instructions.
    #[must_use]
    pub fn with_stop_loss_info(mut self, info: StopLossInfo) -> Self {
        self.stop_loss_info = info;
        self
    }

    /// Copy with a stop trigger price.
    #[must_use]
    pub fn with_stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }
}

impl StackOrder for ContractOrder {
    const LEVEL: &'static str = "contract";

    fn base(&self) -> &OrderBase {
        &self.base
    }

    fn with_base(mut self, base: OrderBase) -> Self {
        self.base = base;
        self
    }

    fn order_key(&self) -> String {
        let dates: Vec<&str> = self.contract_dates.iter().map(ContractDate::as_str).collect();
        format!(
            "{}/{}/{}",
            self.base.strategy(),
            self.base.instrument(),
            dates.join("_")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_rejects_leg_mismatch() {
        let result = ContractOrder::new(
            "trend",
            "GOLD",
            vec![ContractDate::new("20240600")],
            TradeQuantity::from_legs(vec![1, -1]),
            OrderType::Best,
        );
        assert!(matches!(result, Err(OrderError::LegCountMismatch { dates: 1, legs: 2 })));
    }

    #[test]
    fn outright_contract_accessors() {
        let contract = FuturesContract::new("GOLD", "20240600");
        let order = ContractOrder::outright("trend", &contract, 10, OrderType::Market)
            .with_stop_price(dec!(95));
        assert_eq!(order.futures_contract().unwrap(), contract);
        assert_eq!(order.stop_price(), Some(dec!(95)));
        assert_eq!(order.order_key(), "trend/GOLD/20240600");
        assert!(!order.is_roll_order());
    }

    #[test]
    fn spread_exposes_each_leg() {
        let order = ContractOrder::new(
            ROLL_PSEUDO_STRATEGY,
            "GOLD",
            vec![ContractDate::new("20240600"), ContractDate::new("20240800")],
            TradeQuantity::from_legs(vec![-3, 3]),
            OrderType::Best,
        )
        .unwrap();
        assert!(order.is_roll_order());
        assert!(order.futures_contract().is_err());
        assert_eq!(
            order.futures_contract_for_leg(1),
            Some(FuturesContract::new("GOLD", "20240800"))
        );
        assert_eq!(order.futures_contract_for_leg(2), None);
    }

    #[test]
    fn stop_loss_marker_survives_serde_and_defaults_off() {
        let contract = FuturesContract::new("GOLD", "20240600");
        let order = ContractOrder::outright("trend", &contract, 10, OrderType::Market);
        assert!(!order.is_stop_loss_processed());

        let marked = order.with_stop_loss_processed();
        let json = serde_json::to_value(&marked).unwrap();
        let back: ContractOrder = serde_json::from_value(json.clone()).unwrap();
        assert!(back.is_stop_loss_processed());

        let mut legacy = json;
        legacy.as_object_mut().unwrap().remove("stop_loss_processed");
        let back: ContractOrder = serde_json::from_value(legacy).unwrap();
        assert!(!back.is_stop_loss_processed());
    }
}
