//! Orders at the instrument, contract and broker levels.

mod base;
mod broker_order;
mod contract_order;
mod errors;
mod family;
mod instrument_order;
mod list;
mod stop_loss;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

pub use base::{OrderBase, OrderType};
pub use broker_order::BrokerOrder;
pub use contract_order::{ContractOrder, ROLL_PSEUDO_STRATEGY};
pub use errors::OrderError;
pub use family::OrderFamily;
pub use instrument_order::InstrumentOrder;
pub use list::ListOfOrders;
pub use stop_loss::{AttachStopLoss, StopLossInfo};

/// An order kind that can live on an [`OrderStack`](crate::domain::order_stack::OrderStack).
///
/// Level-specific fields are preserved by [`StackOrder::with_base`], so the
/// stack only ever rewrites the shared [`OrderBase`].
pub trait StackOrder: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Hierarchy level name used in logs.
    const LEVEL: &'static str;

    /// Shared order state.
    fn base(&self) -> &OrderBase;

    /// Copy with the shared state replaced.
    #[must_use]
    fn with_base(self, base: OrderBase) -> Self;

    /// Human-readable key (strategy, instrument, contracts).
    fn order_key(&self) -> String;
}
