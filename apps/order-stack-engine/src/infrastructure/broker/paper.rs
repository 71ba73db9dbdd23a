//! Paper broker: an in-memory broker connection.
//!
//! Orders are accepted immediately and rest until a fill is reported through
//! [`PaperBroker::report_fill`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::ports::{BrokerError, BrokerPort, OrderWithControls};
use crate::domain::orders::{BrokerOrder, StackOrder};
use crate::domain::shared::{FuturesContract, TradeQuantity};

const BROKER_NAME: &str = "paper";
const ACCOUNT: &str = "PAPER-ACCOUNT";

#[derive(Debug, Default)]
struct PaperState {
    live: HashMap<String, BrokerOrder>,
    submitted: Vec<BrokerOrder>,
    cancelled: Vec<String>,
    closed_contracts: HashSet<FuturesContract>,
}

/// In-memory broker.
#[derive(Debug)]
pub struct PaperBroker {
    state: RwLock<PaperState>,
    commission_per_contract: Decimal,
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperBroker {
    /// Broker with no commission and every contract tradeable.
    #[must_use]
    pub fn new() -> Self {
        Self::with_commission(Decimal::ZERO)
    }

    /// Broker charging `per_contract` on every filled contract.
    #[must_use]
    pub fn with_commission(per_contract: Decimal) -> Self {
        Self {
            state: RwLock::new(PaperState::default()),
            commission_per_contract: per_contract,
        }
    }

    /// Open or close the market for a contract.
    pub async fn set_contract_tradeable(&self, contract: FuturesContract, tradeable: bool) {
        let mut state = self.state.write().await;
        if tradeable {
            state.closed_contracts.remove(&contract);
        } else {
            state.closed_contracts.insert(contract);
        }
    }

    /// Every order ever submitted, in submission order.
    pub async fn submitted_orders(&self) -> Vec<BrokerOrder> {
        self.state.read().await.submitted.clone()
    }

    /// References of cancelled orders.
    pub async fn cancelled_refs(&self) -> Vec<String> {
        self.state.read().await.cancelled.clone()
    }

    /// A resting order by control reference.
    pub async fn live_order(&self, control_ref: &str) -> Option<BrokerOrder> {
        self.state.read().await.live.get(control_ref).cloned()
    }

    /// Report a fill for a resting order at one price for every leg.
    ///
    /// The broker reports what it reports: a fill larger than the order is
    /// recorded as-is so that the stack can reject it.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::OrderNotFound` for unknown references.
    pub async fn report_fill(
        &self,
        control_ref: &str,
        fill: TradeQuantity,
        price: Decimal,
    ) -> Result<(), BrokerError> {
        let legs = vec![price; fill.len()];
        self.report_fill_with_leg_prices(control_ref, fill, price, legs).await
    }

    /// Report a fill with explicit per-leg prices.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::OrderNotFound` for unknown references.
    pub async fn report_fill_with_leg_prices(
        &self,
        control_ref: &str,
        fill: TradeQuantity,
        price: Decimal,
        leg_prices: Vec<Decimal>,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.write().await;
        let live = state
            .live
            .remove(control_ref)
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_ref: control_ref.to_string(),
            })?;

        let mut base = live.base().clone();
        if base.trade().is_exceeded_by(&fill) {
            base = base
                .with_trade(fill.clone())
                .map_err(|e| BrokerError::OrderRejected { reason: e.to_string() })?;
        }
        let base = base
            .with_fill(fill, Some(price), Some(Utc::now()))
            .map_err(|e| BrokerError::OrderRejected { reason: e.to_string() })?;

        let updated = live
            .with_base(base)
            .with_leg_filled_prices(leg_prices)
            .with_broker_permid(format!("perm-{control_ref}"));
        debug!(control_ref, fill = %updated.base().fill(), "Paper fill reported");
        state.live.insert(control_ref.to_string(), updated);
        Ok(())
    }
}

#[async_trait]
impl BrokerPort for PaperBroker {
    async fn is_contract_tradeable(&self, contract: &FuturesContract) -> Result<bool, BrokerError> {
        Ok(!self.state.read().await.closed_contracts.contains(contract))
    }

    async fn match_stored_order_to_live_order(
        &self,
        stored: &BrokerOrder,
    ) -> Result<Option<BrokerOrder>, BrokerError> {
        let Some(control_ref) = stored.broker_tempid() else {
            return Ok(None);
        };
        Ok(self.state.read().await.live.get(control_ref).cloned())
    }

    async fn submit(&self, order: &BrokerOrder) -> Result<Option<OrderWithControls>, BrokerError> {
        let control_ref = format!("paper-{}", Uuid::new_v4());
        let placed = order
            .clone()
            .submitted(BROKER_NAME, ACCOUNT, control_ref.clone(), Utc::now());

        let mut state = self.state.write().await;
        state.live.insert(control_ref.clone(), placed.clone());
        state.submitted.push(placed.clone());

        info!(
            control_ref = %control_ref,
            key = %placed.order_key(),
            trade = %placed.base().trade(),
            "Paper order accepted"
        );
        Ok(Some(OrderWithControls::new(placed, control_ref)))
    }

    async fn compute_total_commission(&self, order: BrokerOrder) -> Result<BrokerOrder, BrokerError> {
        let filled = Decimal::from(order.base().fill().total_abs_qty());
        Ok(order.with_commission(filled * self.commission_per_contract))
    }

    async fn cancel_order(&self, order: &BrokerOrder) -> Result<(), BrokerError> {
        let control_ref = order
            .broker_tempid()
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_ref: order.order_key(),
            })?
            .to_string();
        let mut state = self.state.write().await;
        state.live.remove(&control_ref);
        state.cancelled.push(control_ref);
        Ok(())
    }

    async fn modify_order_quantity(
        &self,
        order: &BrokerOrder,
        new_trade: &TradeQuantity,
    ) -> Result<(), BrokerError> {
        let control_ref = order.broker_tempid().ok_or_else(|| BrokerError::OrderNotFound {
            order_ref: order.order_key(),
        })?;
        let mut state = self.state.write().await;
        let live = state
            .live
            .remove(control_ref)
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_ref: control_ref.to_string(),
            })?;
        let base = live
            .base()
            .clone()
            .with_trade(new_trade.clone())
            .map_err(|e| BrokerError::OrderRejected { reason: e.to_string() })?;
        state.live.insert(control_ref.to_string(), live.with_base(base));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orders::{ContractOrder, OrderType};
    use rust_decimal_macros::dec;

    fn order() -> BrokerOrder {
        let contract = FuturesContract::new("GOLD", "20240600");
        let parent = ContractOrder::outright("trend", &contract, 5, OrderType::Market);
        BrokerOrder::from_contract_order(&parent, TradeQuantity::single(5), OrderType::Market, "algo_market")
            .unwrap()
    }

    #[tokio::test]
    async fn submit_then_fill_then_match() {
        let broker = PaperBroker::with_commission(dec!(2));
        let placed = broker.submit(&order()).await.unwrap().unwrap();
        assert_eq!(placed.order.broker(), "paper");

        broker
            .report_fill(&placed.control_ref, TradeQuantity::single(5), dec!(101))
            .await
            .unwrap();
        let live = broker
            .match_stored_order_to_live_order(&placed.order)
            .await
            .unwrap()
            .unwrap();
        assert!(live.base().fill_equals_trade());

        let with_commission = broker.compute_total_commission(live).await.unwrap();
        assert_eq!(with_commission.commission(), Some(dec!(10)));
    }

    #[tokio::test]
    async fn unsubmitted_order_has_no_match() {
        let broker = PaperBroker::new();
        assert!(
            broker
                .match_stored_order_to_live_order(&order())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn cancel_and_modify() {
        let broker = PaperBroker::new();
        let placed = broker.submit(&order()).await.unwrap().unwrap();
        broker
            .modify_order_quantity(&placed.order, &TradeQuantity::single(2))
            .await
            .unwrap();
        assert_eq!(
            broker.live_order(&placed.control_ref).await.unwrap().base().trade(),
            &TradeQuantity::single(2)
        );
        broker.cancel_order(&placed.order).await.unwrap();
        assert!(broker.live_order(&placed.control_ref).await.is_none());
        assert_eq!(broker.cancelled_refs().await, vec![placed.control_ref]);
    }

    #[tokio::test]
    async fn closed_market_is_not_tradeable() {
        let broker = PaperBroker::new();
        let contract = FuturesContract::new("GOLD", "20240600");
        broker.set_contract_tradeable(contract.clone(), false).await;
        assert!(!broker.is_contract_tradeable(&contract).await.unwrap());
    }
}
