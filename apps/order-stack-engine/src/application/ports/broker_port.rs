//! Broker Port (Driven Port)
//!
//! Interface for the live broker connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::orders::BrokerOrder;
use crate::domain::shared::{FuturesContract, TradeQuantity};

/// A broker order as placed, plus the handle used to control it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithControls {
    /// The placed order, stamped with broker identity.
    pub order: BrokerOrder,
    /// Broker-side reference used for cancel and modify.
    pub control_ref: String,
}

impl OrderWithControls {
    /// Pair a placed order with its control reference.
    #[must_use]
    pub fn new(order: BrokerOrder, control_ref: impl Into<String>) -> Self {
        Self {
            order,
            control_ref: control_ref.into(),
        }
    }
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Connection error.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found: {order_ref}")]
    OrderNotFound {
        /// The missing order reference.
        order_ref: String,
    },
}

/// Port for broker interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Whether the market for `contract` is open and tradeable.
    async fn is_contract_tradeable(&self, contract: &FuturesContract) -> Result<bool, BrokerError>;

    /// The live broker order matching a stored one, `None` if the broker
    /// does not know it (yet).
    async fn match_stored_order_to_live_order(
        &self,
        stored: &BrokerOrder,
    ) -> Result<Option<BrokerOrder>, BrokerError>;

    /// Submit an order; `None` if nothing was placed.
    async fn submit(&self, order: &BrokerOrder) -> Result<Option<OrderWithControls>, BrokerError>;

    /// Copy of `order` with the total commission filled in.
    async fn compute_total_commission(&self, order: BrokerOrder) -> Result<BrokerOrder, BrokerError>;

    /// Cancel a live order.
    async fn cancel_order(&self, order: &BrokerOrder) -> Result<(), BrokerError>;

    /// Change the size of a live order.
    async fn modify_order_quantity(
        &self,
        order: &BrokerOrder,
        new_trade: &TradeQuantity,
    ) -> Result<(), BrokerError>;
}
