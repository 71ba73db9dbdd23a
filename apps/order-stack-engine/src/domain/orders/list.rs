//! Aggregates over a list of sibling orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::StackOrder;
use super::errors::OrderError;
use crate::domain::shared::TradeQuantity;

/// Sibling orders, typically the broker children of one contract order.
#[derive(Debug, Clone)]
pub struct ListOfOrders<O> {
    orders: Vec<O>,
}

impl<O: StackOrder> ListOfOrders<O> {
    /// Wrap a list of orders.
    #[must_use]
    pub const fn new(orders: Vec<O>) -> Self {
        Self { orders }
    }

    /// The orders.
    #[must_use]
    pub fn orders(&self) -> &[O] {
        &self.orders
    }

    /// Consume into the inner vector.
    #[must_use]
    pub fn into_inner(self) -> Vec<O> {
        self.orders
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// True when every order has zero fill (or the list is empty).
    #[must_use]
    pub fn all_zero_fills(&self) -> bool {
        self.orders.iter().all(|o| o.base().fill_equals_zero())
    }

    /// Leg-wise sum of fills, `None` for an empty list.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Domain` when orders have different leg counts.
    pub fn total_filled_qty(&self) -> Result<Option<TradeQuantity>, OrderError> {
        let mut fills = self.orders.iter().map(|o| o.base().fill());
        let Some(first) = fills.next() else {
            return Ok(None);
        };
        let mut total = first.clone();
        for fill in fills {
            total = total.checked_add(fill)?;
        }
        Ok(Some(total))
    }

    /// Simple mean of the fill prices of orders that have filled.
    #[must_use]
    pub fn average_fill_price(&self) -> Option<Decimal> {
        let prices: Vec<Decimal> = self
            .orders
            .iter()
            .filter(|o| !o.base().fill_equals_zero())
            .filter_map(|o| o.base().filled_price())
            .collect();
        if prices.is_empty() {
            return None;
        }
        let sum: Decimal = prices.iter().copied().sum();
        Some(sum / Decimal::from(prices.len()))
    }

    /// Latest fill time across the list.
    #[must_use]
    pub fn final_fill_datetime(&self) -> Option<DateTime<Utc>> {
        self.orders
            .iter()
            .filter_map(|o| o.base().fill_datetime())
            .max()
    }
}
