//! Shared Domain Types
//!
//! Value objects and errors shared across the order, stack and control modules.

pub mod errors;
pub mod value_objects;

pub use errors::DomainError;
pub use value_objects::{
    ContractDate, FuturesContract, InstrumentCode, InstrumentStrategy, OrderId, StrategyName,
    TradeQuantity,
};
