//! Order stack errors.

use thiserror::Error;

use super::store::StoreError;
use crate::domain::orders::OrderError;
use crate::domain::shared::{OrderId, TradeQuantity};

/// Errors raised by [`OrderStack`](super::OrderStack) operations.
#[derive(Debug, Error)]
pub enum StackError {
    /// No order with this id on the stack.
    #[error("order {order_id} not found on {stack} stack")]
    OrderNotFound {
        /// Stack name.
        stack: String,
        /// Missing id.
        order_id: OrderId,
    },

    /// A fill larger than the requested trade was rejected.
    #[error("fill {fill} exceeds trade {trade} for order {order_id} on {stack} stack")]
    FillExceedsTrade {
        /// Stack name.
        stack: String,
        /// Order id.
        order_id: OrderId,
        /// Requested trade.
        trade: TradeQuantity,
        /// Rejected fill.
        fill: TradeQuantity,
    },

    /// The order is already owned by an executing agent.
    #[error("order {order_id} on {stack} stack is already locked")]
    AlreadyLocked {
        /// Stack name.
        stack: String,
        /// Order id.
        order_id: OrderId,
    },

    /// The parent already has children; use `add_another_child`.
    #[error("order {order_id} on {stack} stack already has children")]
    ChildrenAlreadyPresent {
        /// Stack name.
        stack: String,
        /// Parent id.
        order_id: OrderId,
    },

    /// A multi-order write failed part way and everything written was removed
    /// again. The caller may retry.
    #[error("write to {stack} stack failed and was rolled back: {reason}")]
    RollbackSucceeded {
        /// Stack name.
        stack: String,
        /// Original failure.
        reason: String,
    },

    /// A compensating action failed, or an invariant no longer holds.
    #[error("{stack} stack possibly corrupted: {reason}")]
    StackCorrupted {
        /// Stack name.
        stack: String,
        /// What went wrong.
        reason: String,
    },

    /// The order record rejected a change.
    #[error("invalid change to order {order_id} on {stack} stack: {source}")]
    InvalidOrder {
        /// Stack name.
        stack: String,
        /// Order id.
        order_id: OrderId,
        /// Underlying error.
        #[source]
        source: OrderError,
    },

    /// The underlying keyed collection failed.
    #[error("storage failure on {stack} stack: {source}")]
    Storage {
        /// Stack name.
        stack: String,
        /// Underlying error.
        #[source]
        source: StoreError,
    },

    /// A stored record could not be (de)serialized.
    #[error("serialization failure on {stack} stack: {source}")]
    Serialization {
        /// Stack name.
        stack: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl StackError {
    /// True for the not-found case.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::OrderNotFound { .. })
    }
}
