// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Order Stack Engine - Rust Core Library
//!
//! Execution core for futures trading: order stacks, fill propagation,
//! catastrophic stop-losses and retirement of completed order families.
//!
//! # Architecture (Clean Architecture + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: orders, stacks and trading controls, free of I/O
//!   - `orders`: instrument, contract and broker orders, stop-loss info
//!   - `order_stack`: generic `OrderStack` over a keyed `OrderStore`
//!   - `controls`: delay days and overrides
//!
//! - **Application**: use cases and orchestration
//!   - `ports`: broker, positions, overrides, delay days, controls, archive
//!   - `algos`: execution algos resolved from configuration
//!   - `stack_handler`: the sweep pipeline
//!
//! - **Infrastructure**: adapters
//!   - `persistence`: in-memory stores
//!   - `broker`: paper broker
//!   - `config`: dependency injection container
//!
//! # Stacks
//!
//! Five stacks exist at runtime: instrument → contract → broker for strategy
//! trades, and a shadow stop-loss contract → broker pair for catastrophic
//! stop-losses.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// YAML configuration.
pub mod config;

/// Error codes and the stack handler error.
pub mod error;

/// Prometheus metrics.
pub mod observability;

/// Tracing setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use application::stack_handler::{OrderStacks, StackHandler, StackHandlerPorts, StopLossAction, SweepReport};
pub use config::{Config, ConfigError, load_config, load_config_from_string};
pub use domain::order_stack::{CompletionPolicy, OrderStack, StackError};
pub use domain::orders::{
    AttachStopLoss, BrokerOrder, ContractOrder, InstrumentOrder, OrderType, StopLossInfo,
};
pub use domain::shared::{FuturesContract, InstrumentStrategy, OrderId, TradeQuantity};
pub use error::{ErrorCode, StackHandlerError};
pub use infrastructure::config::Container;
