//! Order-level errors.

use thiserror::Error;

use crate::domain::shared::{DomainError, TradeQuantity};

/// Errors raised when an order record rejects a change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// A fill would be larger than the requested trade on some leg.
    #[error("fill {fill} exceeds trade {trade}")]
    FillExceedsTrade {
        /// Requested trade.
        trade: TradeQuantity,
        /// Rejected fill.
        fill: TradeQuantity,
    },

    /// `with_children` called on an order that already has children.
    #[error("order already has {existing} children")]
    ChildrenAlreadyPresent {
        /// Number of existing children.
        existing: usize,
    },

    /// Contract dates and trade legs disagree.
    #[error("{dates} contract dates for a {legs}-leg trade")]
    LegCountMismatch {
        /// Number of contract dates.
        dates: usize,
        /// Number of trade legs.
        legs: usize,
    },

    /// Value object rejected the change.
    #[error(transparent)]
    Domain(#[from] DomainError),
}
