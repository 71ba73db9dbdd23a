//! Broker-level orders, one per submission to the broker.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StackOrder;
use super::base::{OrderBase, OrderType};
use super::contract_order::ContractOrder;
use super::errors::OrderError;
use crate::domain::shared::{ContractDate, FuturesContract, TradeQuantity};

/// An order as placed at the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerOrder {
    base: OrderBase,
    contract_dates: Vec<ContractDate>,
    algo_used: String,
    #[serde(default)]
    broker: String,
    #[serde(default)]
    broker_account: String,
    #[serde(default)]
    broker_clientid: Option<i64>,
    #[serde(default)]
    broker_permid: Option<String>,
    #[serde(default)]
    broker_tempid: Option<String>,
    #[serde(default)]
    commission: Option<Decimal>,
    #[serde(default)]
    leg_filled_prices: Vec<Decimal>,
    #[serde(default)]
    stop_price: Option<Decimal>,
    #[serde(default)]
    submit_datetime: Option<DateTime<Utc>>,
}

impl BrokerOrder {
    /// Child of `parent` trading `trade`, unsubmitted.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::LegCountMismatch` if `trade` does not have one
    /// leg per contract date of the parent.
    pub fn from_contract_order(
        parent: &ContractOrder,
        trade: TradeQuantity,
        order_type: OrderType,
        algo_used: impl Into<String>,
    ) -> Result<Self, OrderError> {
        let dates = parent.contract_dates().to_vec();
        if dates.len() != trade.len() {
            return Err(OrderError::LegCountMismatch {
                dates: dates.len(),
                legs: trade.len(),
            });
        }
        let pb = parent.base();
        let mut base = OrderBase::new(pb.strategy().clone(), pb.instrument().clone(), trade, order_type);
        if let Some(parent_id) = pb.order_id() {
            base = base.with_parent(parent_id);
        }
        Ok(Self {
            base,
            contract_dates: dates,
            algo_used: algo_used.into(),
            broker: String::new(),
            broker_account: String::new(),
            broker_clientid: None,
            broker_permid: None,
            broker_tempid: None,
            commission: None,
            leg_filled_prices: Vec::new(),
            stop_price: parent.stop_price(),
            submit_datetime: None,
        })
    }

    /// Contract dates, one per leg.
    #[must_use]
    pub fn contract_dates(&self) -> &[ContractDate] {
        &self.contract_dates
    }

    /// Contract traded on one leg.
    #[must_use]
    pub fn futures_contract_for_leg(&self, leg: usize) -> Option<FuturesContract> {
        self.contract_dates
            .get(leg)
            .map(|date| FuturesContract::new(self.base.instrument().clone(), date.clone()))
    }

    /// Execution algo that placed this order.
    #[must_use]
    pub fn algo_used(&self) -> &str {
        &self.algo_used
    }

    /// Broker name.
    #[must_use]
    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Broker account.
    #[must_use]
    pub fn broker_account(&self) -> &str {
        &self.broker_account
    }

    /// Broker client id.
    #[must_use]
    pub const fn broker_clientid(&self) -> Option<i64> {
        self.broker_clientid
    }

    /// Permanent id assigned by the broker.
    #[must_use]
    pub fn broker_permid(&self) -> Option<&str> {
        self.broker_permid.as_deref()
    }

    /// Temporary id used before the permanent id is known.
    #[must_use]
    pub fn broker_tempid(&self) -> Option<&str> {
        self.broker_tempid.as_deref()
    }

    /// Total commission charged.
    #[must_use]
    pub const fn commission(&self) -> Option<Decimal> {
        self.commission
    }

    /// Fill price per leg.
    #[must_use]
    pub fn leg_filled_prices(&self) -> &[Decimal] {
        &self.leg_filled_prices
    }

    /// Stop trigger price.
    #[must_use]
    pub const fn stop_price(&self) -> Option<Decimal> {
        self.stop_price
    }

    /// When the order was sent.
    #[must_use]
    pub const fn submit_datetime(&self) -> Option<DateTime<Utc>> {
        self.submit_datetime
    }

    /// Copy stamped with broker-side identity after submission.
    #[must_use]
    pub fn submitted(
        mut self,
        broker: impl Into<String>,
        broker_account: impl Into<String>,
        broker_tempid: impl Into<String>,
        submit_datetime: DateTime<Utc>,
    ) -> Self {
        self.broker = broker.into();
        self.broker_account = broker_account.into();
        self.broker_tempid = Some(broker_tempid.into());
        self.submit_datetime = Some(submit_datetime);
        self
    }

    /// Copy with the broker's client id.
    #[must_use]
    pub fn with_broker_clientid(mut self, clientid: i64) -> Self {
        self.broker_clientid = Some(clientid);
        self
    }

    /// Copy with the broker's permanent id.
    #[must_use]
    pub fn with_broker_permid(mut self, permid: impl Into<String>) -> Self {
        self.broker_permid = Some(permid.into());
        self
    }

    /// Copy with the total commission.
    #[must_use]
    pub fn with_commission(mut self, commission: Decimal) -> Self {
        self.commission = Some(commission);
        self
    }

    /// Copy with per-leg fill prices.
    #[must_use]
    pub fn with_leg_filled_prices(mut self, prices: Vec<Decimal>) -> Self {
        self.leg_filled_prices = prices;
        self
    }

    /// Merge the fill and commission details the broker reported for the
    /// matching live order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::FillExceedsTrade` if the reported fill exceeds
    /// this order's trade; `self` is left untouched.
    pub fn with_execution_details(self, live: &Self) -> Result<Self, OrderError> {
        let live_base = live.base();
        let base = self.base.clone().with_fill(
            live_base.fill().clone(),
            live_base.filled_price(),
            live_base.fill_datetime(),
        )?;
        let mut merged = self.with_base(base);
        if live.commission.is_some() {
            merged.commission = live.commission;
        }
        if !live.leg_filled_prices.is_empty() {
            merged.leg_filled_prices.clone_from(&live.leg_filled_prices);
        }
        if live.broker_permid.is_some() {
            merged.broker_permid.clone_from(&live.broker_permid);
        }
        Ok(merged)
    }
}

impl StackOrder for BrokerOrder {
    const LEVEL: &'static str = "broker";

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
    use crate::domain::shared::OrderId;
    use rust_decimal_macros::dec;

    fn parent() -> ContractOrder {
        let contract = FuturesContract::new("GOLD", "20240600");
        let order = ContractOrder::outright("trend", &contract, -10, OrderType::Stop)
            .with_stop_price(dec!(95));
        order.clone().with_base(order.base().clone().with_order_id(OrderId::new(4)))
    }

    #[test]
    fn child_inherits_parent_identity_and_stop_price() {
        let child = BrokerOrder::from_contract_order(
            &parent(),
            TradeQuantity::single(-10),
            OrderType::Stop,
            "algo_stop",
        )
        .unwrap();
        assert_eq!(child.base().parent(), Some(OrderId::new(4)));
        assert_eq!(child.stop_price(), Some(dec!(95)));
        assert_eq!(child.algo_used(), "algo_stop");
        assert_eq!(child.order_key(), "trend/GOLD/20240600");
    }

    #[test]
    fn execution_details_merge_and_reject_overfill() {
        let stored = BrokerOrder::from_contract_order(
            &parent(),
            TradeQuantity::single(-10),
            OrderType::Stop,
            "algo_stop",
        )
        .unwrap();

        let live_base = stored
            .base()
            .clone()
            .with_fill(TradeQuantity::single(-4), Some(dec!(94.5)), Some(Utc::now()))
            .unwrap();
        let live = stored
            .clone()
            .with_base(live_base)
            .with_commission(dec!(2.5))
            .with_broker_permid("perm-1");

        let merged = stored.clone().with_execution_details(&live).unwrap();
        assert_eq!(merged.base().fill(), &TradeQuantity::single(-4));
        assert_eq!(merged.commission(), Some(dec!(2.5)));
        assert_eq!(merged.broker_permid(), Some("perm-1"));

        let mut overfilled = live.clone();
        let big = TradeQuantity::single(-12);
        overfilled = overfilled.with_base(
            OrderBase::new("trend", "GOLD", TradeQuantity::single(-12), OrderType::Stop)
                .with_fill(big, Some(dec!(94)), None)
                .unwrap(),
        );
        assert!(matches!(
            stored.with_execution_details(&overfilled),
            Err(OrderError::FillExceedsTrade { .. })
        ));
    }
}
