//! In-memory stores for testing, development and the paper-trading binary.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::application::ports::{
    DelayDaysStorePort, HistoricOrderArchivePort, OverrideStorePort, PortError,
    PositionStorePort, TradeControlsPort,
};
use crate::domain::controls::{DelayDays, Override};
use crate::domain::order_stack::{OrderStore, StoreError};
use crate::domain::orders::{BrokerOrder, ContractOrder, InstrumentOrder, StackOrder};
use crate::domain::shared::{
    FuturesContract, InstrumentCode, InstrumentStrategy, OrderId, TradeQuantity,
};

// =============================================================================
// Order store
// =============================================================================

/// In-memory implementation of `OrderStore`.
///
/// Suitable for testing and development. Not durable.
#[derive(Debug)]
pub struct InMemoryOrderStore {
    records: RwLock<BTreeMap<OrderId, Value>>,
    next_id: AtomicU64,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderStore {
    /// Create a new empty store. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn allocate_id(&self) -> Result<OrderId, StoreError> {
        Ok(OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Value>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn insert(&self, id: OrderId, record: Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        records.insert(id, record);
        Ok(())
    }

    async fn update(&self, id: OrderId, record: Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn ids(&self) -> Result<Vec<OrderId>, StoreError> {
        Ok(self.records.read().await.keys().copied().collect())
    }
}

// =============================================================================
// Positions
// =============================================================================

/// In-memory contract and instrument positions.
#[derive(Debug, Default)]
pub struct InMemoryPositionStore {
    contract_positions: RwLock<HashMap<FuturesContract, i64>>,
    instrument_positions: RwLock<HashMap<InstrumentStrategy, i64>>,
}

impl InMemoryPositionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a contract position (for test setup).
    pub async fn set_contract_position(&self, contract: FuturesContract, position: i64) {
        self.contract_positions.write().await.insert(contract, position);
    }

    /// Current (instrument, strategy) position.
    pub async fn instrument_position(&self, key: &InstrumentStrategy) -> i64 {
        self.instrument_positions
            .read()
            .await
            .get(key)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PositionStorePort for InMemoryPositionStore {
    async fn apply_contract_position_delta(
        &self,
        order: &ContractOrder,
        delta: &TradeQuantity,
    ) -> Result<(), PortError> {
        let mut positions = self.contract_positions.write().await;
        for (leg, qty) in delta.legs().iter().enumerate() {
            let contract = order
                .futures_contract_for_leg(leg)
                .ok_or_else(|| PortError::NotFound {
                    what: "contract leg",
                    key: format!("{} leg {leg}", order.order_key()),
                })?;
            *positions.entry(contract).or_default() += qty;
        }
        Ok(())
    }

    async fn apply_instrument_position_delta(
        &self,
        order: &ContractOrder,
        delta: &TradeQuantity,
    ) -> Result<(), PortError> {
        let key = order.base().instrument_strategy();
        *self.instrument_positions.write().await.entry(key).or_default() += delta.total_qty();
        Ok(())
    }

    async fn current_position(&self, contract: &FuturesContract) -> Result<i64, PortError> {
        Ok(self
            .contract_positions
            .read()
            .await
            .get(contract)
            .copied()
            .unwrap_or_default())
    }
}

// =============================================================================
// Overrides and delay days
// =============================================================================

/// In-memory override records.
#[derive(Debug, Default)]
pub struct InMemoryOverrideStore {
    overrides: RwLock<HashMap<String, Override>>,
}

impl InMemoryOverrideStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OverrideStorePort for InMemoryOverrideStore {
    async fn get_override(&self, key: &str) -> Result<Option<Override>, PortError> {
        Ok(self.overrides.read().await.get(key).copied())
    }

    async fn set_override(&self, key: &str, value: Override) -> Result<(), PortError> {
        self.overrides.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// In-memory delay-days counters.
#[derive(Debug, Default)]
pub struct InMemoryDelayDaysStore {
    counters: RwLock<HashMap<String, DelayDays>>,
}

impl InMemoryDelayDaysStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DelayDaysStorePort for InMemoryDelayDaysStore {
    async fn get_delay_days(&self, key: &str) -> Result<Option<DelayDays>, PortError> {
        Ok(self.counters.read().await.get(key).copied())
    }

    async fn set_delay_days(&self, key: &str, days: DelayDays) -> Result<(), PortError> {
        self.counters.write().await.insert(key.to_string(), days);
        Ok(())
    }

    async fn delete_delay_days(&self, key: &str) -> Result<(), PortError> {
        self.counters
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound {
                what: "delay days",
                key: key.to_string(),
            })
    }
}

// =============================================================================
// Trade controls
// =============================================================================

/// In-memory instrument locks and trade limits. Pairs without a limit are
/// unrestricted.
#[derive(Debug, Default)]
pub struct InMemoryTradeControls {
    locked: RwLock<HashSet<InstrumentCode>>,
    limits: RwLock<HashMap<InstrumentStrategy, u64>>,
}

impl InMemoryTradeControls {
    /// No locks, no limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock or unlock an instrument.
    pub async fn set_instrument_locked(&self, instrument: InstrumentCode, locked: bool) {
        let mut set = self.locked.write().await;
        if locked {
            set.insert(instrument);
        } else {
            set.remove(&instrument);
        }
    }

    /// Cap the absolute size of any single trade for a pair.
    pub async fn set_trade_limit(&self, key: InstrumentStrategy, max_abs_qty: u64) {
        self.limits.write().await.insert(key, max_abs_qty);
    }
}

#[async_trait]
impl TradeControlsPort for InMemoryTradeControls {
    async fn is_instrument_locked(&self, instrument: &InstrumentCode) -> Result<bool, PortError> {
        Ok(self.locked.read().await.contains(instrument))
    }

    async fn what_trade_is_possible(
        &self,
        instrument_strategy: &InstrumentStrategy,
        proposed: &TradeQuantity,
    ) -> Result<u64, PortError> {
        let requested = proposed.total_abs_qty();
        Ok(self
            .limits
            .read()
            .await
            .get(instrument_strategy)
            .map_or(requested, |limit| requested.min(*limit)))
    }
}

// =============================================================================
// Historic archive
// =============================================================================

/// One archived order family.
#[derive(Debug, Clone)]
pub struct ArchivedFamily {
    /// Root instrument order, absent for stop-loss families.
    pub instrument_order: Option<InstrumentOrder>,
    /// Contract orders.
    pub contract_orders: Vec<ContractOrder>,
    /// Broker orders.
    pub broker_orders: Vec<BrokerOrder>,
}

/// In-memory historic order archive.
#[derive(Debug, Default)]
pub struct InMemoryHistoricOrderArchive {
    families: RwLock<Vec<ArchivedFamily>>,
}

impl InMemoryHistoricOrderArchive {
    /// Create an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything archived so far.
    pub async fn families(&self) -> Vec<ArchivedFamily> {
        self.families.read().await.clone()
    }
}

#[async_trait]
impl HistoricOrderArchivePort for InMemoryHistoricOrderArchive {
    async fn add_historic_orders(
        &self,
        instrument_order: Option<InstrumentOrder>,
        contract_orders: Vec<ContractOrder>,
        broker_orders: Vec<BrokerOrder>,
    ) -> Result<(), PortError> {
        self.families.write().await.push(ArchivedFamily {
            instrument_order,
            contract_orders,
            broker_orders,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orders::OrderType;
    use crate::domain::shared::ContractDate;
    use serde_json::json;

    #[tokio::test]
    async fn order_store_insert_update_delete() {
        let store = InMemoryOrderStore::new();
        let id = store.allocate_id().await.unwrap();
        assert_eq!(id, OrderId::new(1));

        store.insert(id, json!({"a": 1})).await.unwrap();
        assert!(matches!(
            store.insert(id, json!({})).await,
            Err(StoreError::AlreadyExists(_))
        ));
        store.update(id, json!({"a": 2})).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), Some(json!({"a": 2})));

        store.delete(id).await.unwrap();
        assert!(store.is_empty().await);
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update(id, json!({})).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let store = InMemoryOrderStore::new();
        let a = store.allocate_id().await.unwrap();
        store.insert(a, json!(null)).await.unwrap();
        store.delete(a).await.unwrap();
        let b = store.allocate_id().await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn spread_delta_updates_each_leg() {
        let positions = InMemoryPositionStore::new();
        let order = ContractOrder::new(
            "trend",
            "GOLD",
            vec![ContractDate::new("20240600"), ContractDate::new("20240800")],
            TradeQuantity::from_legs(vec![-2, 2]),
            OrderType::Best,
        )
        .unwrap();
        let delta = TradeQuantity::from_legs(vec![-2, 2]);
        positions.apply_contract_position_delta(&order, &delta).await.unwrap();
        positions.apply_instrument_position_delta(&order, &delta).await.unwrap();

        let near = FuturesContract::new("GOLD", "20240600");
        let far = FuturesContract::new("GOLD", "20240800");
        assert_eq!(positions.current_position(&near).await.unwrap(), -2);
        assert_eq!(positions.current_position(&far).await.unwrap(), 2);
        assert_eq!(
            positions
                .instrument_position(&InstrumentStrategy::new("trend", "GOLD"))
                .await,
            0
        );
    }

    #[tokio::test]
    async fn trade_limits_cap_requested_size() {
        let controls = InMemoryTradeControls::new();
        let key = InstrumentStrategy::new("trend", "GOLD");
        let qty = TradeQuantity::single(-10);
        assert_eq!(controls.what_trade_is_possible(&key, &qty).await.unwrap(), 10);
        controls.set_trade_limit(key.clone(), 4).await;
        assert_eq!(controls.what_trade_is_possible(&key, &qty).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn delete_missing_delay_days_is_not_found() {
        let store = InMemoryDelayDaysStore::new();
        assert!(matches!(
            store.delete_delay_days("trend/GOLD").await,
            Err(PortError::NotFound { .. })
        ));
    }
}
