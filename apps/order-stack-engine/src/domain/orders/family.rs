//! Order family: a root order plus its descendants.

use crate::domain::shared::OrderId;

/// Ids of one order family, recomputed from parent/children links.
///
/// Stop-loss families have no instrument order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderFamily {
    /// Root instrument order, absent for stop-loss families.
    pub instrument_order_id: Option<OrderId>,
    /// Contract orders in the family.
    pub contract_order_ids: Vec<OrderId>,
    /// Broker orders in the family.
    pub broker_order_ids: Vec<OrderId>,
}

impl OrderFamily {
    /// Family rooted at an instrument order.
    #[must_use]
    pub const fn for_instrument_order(
        instrument_order_id: OrderId,
        contract_order_ids: Vec<OrderId>,
        broker_order_ids: Vec<OrderId>,
    ) -> Self {
        Self {
            instrument_order_id: Some(instrument_order_id),
            contract_order_ids,
            broker_order_ids,
        }
    }

    /// Family rooted at a single contract order.
    #[must_use]
    pub fn for_contract_order(contract_order_id: OrderId, broker_order_ids: Vec<OrderId>) -> Self {
        Self {
            instrument_order_id: None,
            contract_order_ids: vec![contract_order_id],
            broker_order_ids,
        }
    }

    /// Number of orders in the family.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.instrument_order_id.is_some())
            + self.contract_order_ids.len()
            + self.broker_order_ids.len()
    }

    /// True when the family has no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
