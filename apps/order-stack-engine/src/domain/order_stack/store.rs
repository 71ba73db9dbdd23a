//! Keyed collection backing an order stack.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::shared::OrderId;

/// Errors from an [`OrderStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Insert of an id that is already present.
    #[error("record {0} already exists")]
    AlreadyExists(OrderId),

    /// Update or delete of an absent id.
    #[error("record {0} not found")]
    NotFound(OrderId),

    /// Backend I/O failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Durable mapping of order id to serialized order record.
///
/// One instance per stack. Every successful write is assumed durable.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Reserve a fresh id; ids are never reused.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` on I/O failure.
    async fn allocate_id(&self) -> Result<OrderId, StoreError>;

    /// Read a record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` on I/O failure.
    async fn get(&self, id: OrderId) -> Result<Option<Value>, StoreError>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the id is taken.
    async fn insert(&self, id: OrderId, record: Value) -> Result<(), StoreError>;

    /// Replace an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is absent.
    async fn update(&self, id: OrderId, record: Value) -> Result<(), StoreError>;

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is absent.
    async fn delete(&self, id: OrderId) -> Result<(), StoreError>;

    /// All ids present, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` on I/O failure.
    async fn ids(&self) -> Result<Vec<OrderId>, StoreError>;
}
