//! Batch inserts that fail part way leave nothing behind.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use order_stack_engine::application::algos::AlgoRegistry;
use order_stack_engine::domain::order_stack::{OrderStore, StoreError};
use order_stack_engine::domain::orders::StackOrder;
use order_stack_engine::infrastructure::persistence::InMemoryOrderStore;
use order_stack_engine::{
    Config, Container, ContractOrder, ErrorCode, FuturesContract, InstrumentOrder, OrderId,
    OrderStacks, OrderType, StackHandler,
};

/// Refuses exactly one insert, the `fail_on`-th (1-based).
struct FlakyStore {
    inner: InMemoryOrderStore,
    fail_on: usize,
    inserts: AtomicUsize,
}

impl FlakyStore {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            fail_on,
            inserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OrderStore for FlakyStore {
    async fn allocate_id(&self) -> Result<OrderId, StoreError> {
        self.inner.allocate_id().await
    }

    async fn get(&self, id: OrderId) -> Result<Option<Value>, StoreError> {
        self.inner.get(id).await
    }

    async fn insert(&self, id: OrderId, record: Value) -> Result<(), StoreError> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.inner.insert(id, record).await
    }

    async fn update(&self, id: OrderId, record: Value) -> Result<(), StoreError> {
        self.inner.update(id, record).await
    }

    async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn ids(&self) -> Result<Vec<OrderId>, StoreError> {
        self.inner.ids().await
    }
}

fn handler_with_flaky_contract_stack(container: &Container) -> StackHandler {
    let stacks = OrderStacks::new(
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(FlakyStore::new(2)),
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryOrderStore::new()),
    );
    let mut config = Config::default();
    config.execution_algos.stop_loss_algo = Some("algo_market".to_string());
    StackHandler::new(stacks, container.ports(), &config, &AlgoRegistry::default()).unwrap()
}

#[tokio::test]
async fn second_of_three_children_failing_removes_the_first() {
    let container = Container::in_memory();
    let handler = handler_with_flaky_contract_stack(&container);
    let instrument_id = handler
        .put_instrument_order(InstrumentOrder::new("trend", "GOLD", 3, OrderType::Market))
        .await
        .unwrap();

    let children = ["20240600", "20240800", "20241200"]
        .into_iter()
        .map(|date| {
            ContractOrder::outright("trend", &FuturesContract::new("GOLD", date), 1, OrderType::Market)
        })
        .collect();
    let err = handler
        .spawn_contract_orders(instrument_id, children)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::RecoverableRollback);
    assert!(!err.is_fatal());
    assert!(handler.stacks().contract.list_orders(false).await.unwrap().is_empty());
    let parent = handler
        .stacks()
        .instrument
        .get_or_not_found(instrument_id)
        .await
        .unwrap();
    assert!(!parent.base().has_children());
}

#[tokio::test]
async fn retry_after_rollback_succeeds() {
    let container = Container::in_memory();
    let handler = handler_with_flaky_contract_stack(&container);
    let instrument_id = handler
        .put_instrument_order(InstrumentOrder::new("trend", "GOLD", 2, OrderType::Market))
        .await
        .unwrap();
    let children = || {
        vec![
            ContractOrder::outright("trend", &FuturesContract::new("GOLD", "20240600"), 1, OrderType::Market),
            ContractOrder::outright("trend", &FuturesContract::new("GOLD", "20240800"), 1, OrderType::Market),
        ]
    };

    assert!(handler.spawn_contract_orders(instrument_id, children()).await.is_err());
    let child_ids = handler
        .spawn_contract_orders(instrument_id, children())
        .await
        .unwrap();

    assert_eq!(child_ids.len(), 2);
    let parent = handler
        .stacks()
        .instrument
        .get_or_not_found(instrument_id)
        .await
        .unwrap();
    assert_eq!(parent.base().children(), child_ids.as_slice());
}
