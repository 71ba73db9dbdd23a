//! Stack Handler
//!
//! Owns the five order stacks and drives every order through its life:
//! spawning children, passing broker fills upwards, attaching and resizing
//! catastrophic stop-losses, and retiring completed families.
//!
//! Stop-loss orders live on a shadow pair of stacks (contract and broker)
//! with no instrument level above them.
//!
//! # Failure discipline
//!
//! Multi-stack writes are not transactional. Each step that can fail part way
//! has an explicit compensating action (remove what was inserted, release the
//! lock). When compensation itself fails the error is `STACK_CORRUPTED`, logged
//! as critical, and that order's processing stops. The sweep moves on to the
//! next order; retries only ever come from the next sweep.

mod completions;
mod compensation;
mod fills;
mod resize;
mod spawn;
mod stop_loss_creation;
mod stop_loss_decision;
mod stop_loss_fills;
mod sweep;

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::application::algos::{AlgoRegistry, ExecutionAlgo};
use crate::application::ports::{
    BrokerPort, DelayDaysStorePort, HistoricOrderArchivePort, OverrideStorePort,
    PositionStorePort, TradeControlsPort,
};
use crate::application::services::DelayDaysService;
use crate::config::{Config, StopLossConfig, SweepConfig};
use crate::domain::order_stack::{OrderStack, OrderStore};
use crate::domain::orders::{BrokerOrder, ContractOrder, InstrumentOrder};
use crate::error::{ErrorCode, StackHandlerError};
use crate::observability::record_stack_corruption;

pub use compensation::{
    add_children_to_parent_or_rollback_children, put_children_on_stack,
    rollback_parents_and_children,
};
pub use stop_loss_decision::StopLossAction;
pub use sweep::SweepReport;

/// The five stacks the handler works on.
#[derive(Debug, Clone)]
pub struct OrderStacks {
    /// Strategy-level orders.
    pub instrument: OrderStack<InstrumentOrder>,
    /// Contract-level children of instrument orders.
    pub contract: OrderStack<ContractOrder>,
    /// Broker-level children of contract orders.
    pub broker: OrderStack<BrokerOrder>,
    /// Stop-loss contract orders.
    pub stop_loss_contract: OrderStack<ContractOrder>,
    /// Stop-loss broker orders.
    pub stop_loss_broker: OrderStack<BrokerOrder>,
}

impl OrderStacks {
    /// Stacks over one keyed collection each, in hierarchy order.
    #[must_use]
    pub fn new(
        instrument: Arc<dyn OrderStore>,
        contract: Arc<dyn OrderStore>,
        broker: Arc<dyn OrderStore>,
        stop_loss_contract: Arc<dyn OrderStore>,
        stop_loss_broker: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            instrument: OrderStack::new("instrument", instrument),
            contract: OrderStack::new("contract", contract),
            broker: OrderStack::new("broker", broker),
            stop_loss_contract: OrderStack::new("stop_loss_contract", stop_loss_contract),
            stop_loss_broker: OrderStack::new("stop_loss_broker", stop_loss_broker),
        }
    }
}

/// External collaborators the handler talks to.
#[derive(Clone)]
pub struct StackHandlerPorts {
    /// Live broker connection.
    pub broker: Arc<dyn BrokerPort>,
    /// Contract and instrument positions.
    pub positions: Arc<dyn PositionStorePort>,
    /// Trading overrides.
    pub overrides: Arc<dyn OverrideStorePort>,
    /// Delay-days counters.
    pub delay_days: Arc<dyn DelayDaysStorePort>,
    /// Instrument locks and trade limits.
    pub controls: Arc<dyn TradeControlsPort>,
    /// Historic order storage.
    pub archive: Arc<dyn HistoricOrderArchivePort>,
}

/// Which hierarchy a fill or completion step runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hierarchy {
    Normal,
    StopLoss,
}

impl Hierarchy {
    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::StopLoss => "stop_loss",
        }
    }
}

/// Runs the sweep pipeline over the order stacks.
pub struct StackHandler {
    stacks: OrderStacks,
    broker: Arc<dyn BrokerPort>,
    positions: Arc<dyn PositionStorePort>,
    overrides: Arc<dyn OverrideStorePort>,
    controls: Arc<dyn TradeControlsPort>,
    archive: Arc<dyn HistoricOrderArchivePort>,
    delay_days: DelayDaysService,
    stop_loss_algo: Arc<dyn ExecutionAlgo>,
    stop_loss_config: StopLossConfig,
    sweep_config: SweepConfig,
}

impl StackHandler {
    /// Wire the handler and resolve the stop-loss algo.
    ///
    /// # Errors
    ///
    /// `CONFIGURATION_MISSING` when no stop-loss algo is configured,
    /// `INVALID_CONFIGURATION` when it names an unknown algo.
    pub fn new(
        stacks: OrderStacks,
        ports: StackHandlerPorts,
        config: &Config,
        algos: &AlgoRegistry,
    ) -> Result<Self, StackHandlerError> {
        let algo_name = config
            .execution_algos
            .stop_loss_algo
            .as_deref()
            .ok_or_else(|| {
                escalate(
                    "startup",
                    StackHandlerError::configuration_missing("execution_algos.stop_loss_algo"),
                )
            })?;
        let stop_loss_algo = algos
            .resolve(algo_name, Arc::clone(&ports.broker))
            .map_err(|e| {
                escalate(
                    "startup",
                    StackHandlerError::invalid_configuration(e.to_string())
                        .with_context("key", "execution_algos.stop_loss_algo"),
                )
            })?;
        debug!(algo = %stop_loss_algo.id(), "Resolved stop-loss algo");

        Ok(Self {
            stacks,
            broker: ports.broker,
            positions: ports.positions,
            overrides: ports.overrides,
            controls: ports.controls,
            archive: ports.archive,
            delay_days: DelayDaysService::new(ports.delay_days),
            stop_loss_algo,
            stop_loss_config: config.stop_loss.clone(),
            sweep_config: config.sweep.clone(),
        })
    }

    /// The order stacks.
    #[must_use]
    pub const fn stacks(&self) -> &OrderStacks {
        &self.stacks
    }

    /// Delay-days bookkeeping.
    #[must_use]
    pub const fn delay_days(&self) -> &DelayDaysService {
        &self.delay_days
    }

    /// Sweep settings.
    #[must_use]
    pub const fn sweep_config(&self) -> &SweepConfig {
        &self.sweep_config
    }

    const fn contract_stack(&self, hierarchy: Hierarchy) -> &OrderStack<ContractOrder> {
        match hierarchy {
            Hierarchy::Normal => &self.stacks.contract,
            Hierarchy::StopLoss => &self.stacks.stop_loss_contract,
        }
    }

    const fn broker_stack(&self, hierarchy: Hierarchy) -> &OrderStack<BrokerOrder> {
        match hierarchy {
            Hierarchy::Normal => &self.stacks.broker,
            Hierarchy::StopLoss => &self.stacks.stop_loss_broker,
        }
    }
}

/// Log a fatal error as critical before it is returned.
///
/// Non-fatal errors pass through untouched; they are reported where the sweep
/// catches them.
pub(crate) fn escalate(stage: &'static str, err: StackHandlerError) -> StackHandlerError {
    if err.is_fatal() {
        error!(
            critical = true,
            stage,
            code = %err.code(),
            context = %err.context_string(),
            error = %err,
            "Fatal stack handler error"
        );
        if err.code() == ErrorCode::StackCorrupted {
            record_stack_corruption(stage);
        }
    }
    err
}

/// Report an error caught by a sweep step. Fatal errors were already logged
/// by [`escalate`].
pub(crate) fn log_step_failure(stage: &'static str, err: &StackHandlerError) {
    match err.code() {
        code if code.is_fatal() => {
            debug!(stage, code = %code, "Fatal error already reported, continuing sweep");
        }
        ErrorCode::NotFound | ErrorCode::OrderLocked => {
            debug!(stage, error = %err, "Skipped order");
        }
        _ => {
            warn!(
                stage,
                code = %err.code(),
                context = %err.context_string(),
                error = %err,
                "Order processing failed, next sweep will retry"
            );
        }
    }
}
