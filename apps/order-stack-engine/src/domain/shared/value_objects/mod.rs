//! Shared value objects.

mod contract;
mod identifiers;
mod trade_qty;

pub use contract::{FuturesContract, InstrumentStrategy};
pub use identifiers::{ContractDate, InstrumentCode, OrderId, StrategyName};
pub use trade_qty::TradeQuantity;
