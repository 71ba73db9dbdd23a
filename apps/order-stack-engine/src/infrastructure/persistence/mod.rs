//! Persistence Adapters
//!
//! In-memory implementations of the order store and the other store ports.

mod in_memory;

pub use in_memory::{
    ArchivedFamily, InMemoryDelayDaysStore, InMemoryHistoricOrderArchive, InMemoryOrderStore,
    InMemoryOverrideStore, InMemoryPositionStore, InMemoryTradeControls,
};
