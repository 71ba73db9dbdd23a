//! Dependency Injection Container
//!
//! Wires the in-memory stores and the paper broker into a stack handler.

use std::sync::Arc;

use crate::application::algos::AlgoRegistry;
use crate::application::stack_handler::{OrderStacks, StackHandler, StackHandlerPorts};
use crate::config::Config;
use crate::error::StackHandlerError;
use crate::infrastructure::broker::PaperBroker;
use crate::infrastructure::persistence::{
    InMemoryDelayDaysStore, InMemoryHistoricOrderArchive, InMemoryOrderStore,
    InMemoryOverrideStore, InMemoryPositionStore, InMemoryTradeControls,
};

/// Dependency injection container.
///
/// Holds the concrete adapters so that callers (the binary, integration
/// tests) can inspect them while the handler sees only the port traits.
pub struct Container {
    broker: Arc<PaperBroker>,
    positions: Arc<InMemoryPositionStore>,
    overrides: Arc<InMemoryOverrideStore>,
    delay_days: Arc<InMemoryDelayDaysStore>,
    controls: Arc<InMemoryTradeControls>,
    archive: Arc<InMemoryHistoricOrderArchive>,
    stacks: OrderStacks,
    algos: AlgoRegistry,
}

impl Default for Container {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Container {
    /// Container over fresh in-memory adapters and a paper broker.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_broker(Arc::new(PaperBroker::new()))
    }

    /// Container over fresh in-memory adapters and the given paper broker.
    #[must_use]
    pub fn with_broker(broker: Arc<PaperBroker>) -> Self {
        let stacks = OrderStacks::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOrderStore::new()),
        );
        Self {
            broker,
            positions: Arc::new(InMemoryPositionStore::new()),
            overrides: Arc::new(InMemoryOverrideStore::new()),
            delay_days: Arc::new(InMemoryDelayDaysStore::new()),
            controls: Arc::new(InMemoryTradeControls::new()),
            archive: Arc::new(InMemoryHistoricOrderArchive::new()),
            stacks,
            algos: AlgoRegistry::default(),
        }
    }

    /// Get the paper broker.
    pub fn broker(&self) -> Arc<PaperBroker> {
        Arc::clone(&self.broker)
    }

    /// Get the position store.
    pub fn positions(&self) -> Arc<InMemoryPositionStore> {
        Arc::clone(&self.positions)
    }

    /// Get the override store.
    pub fn overrides(&self) -> Arc<InMemoryOverrideStore> {
        Arc::clone(&self.overrides)
    }

    /// Get the delay-days store.
    pub fn delay_days(&self) -> Arc<InMemoryDelayDaysStore> {
        Arc::clone(&self.delay_days)
    }

    /// Get the trade controls.
    pub fn controls(&self) -> Arc<InMemoryTradeControls> {
        Arc::clone(&self.controls)
    }

    /// Get the historic archive.
    pub fn archive(&self) -> Arc<InMemoryHistoricOrderArchive> {
        Arc::clone(&self.archive)
    }

    /// Every adapter as a port.
    pub fn ports(&self) -> StackHandlerPorts {
        StackHandlerPorts {
            broker: self.broker(),
            positions: self.positions(),
            overrides: self.overrides(),
            delay_days: self.delay_days(),
            controls: self.controls(),
            archive: self.archive(),
        }
    }

    /// Create the `StackHandler`.
    ///
    /// Handlers created from one container share its stacks and stores.
    ///
    /// # Errors
    ///
    /// Fails when the configured stop-loss algo is missing or unknown.
    pub fn stack_handler(&self, config: &Config) -> Result<StackHandler, StackHandlerError> {
        StackHandler::new(self.stacks.clone(), self.ports(), config, &self.algos)
    }
}
