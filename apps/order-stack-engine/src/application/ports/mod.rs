//! Application Ports (Driven)
//!
//! Interfaces to the broker connection and to the persisted state the stack
//! handler reads and writes besides the order stacks.

mod archive_port;
mod broker_port;
mod controls_port;
mod errors;
mod override_port;
mod position_port;

pub use archive_port::HistoricOrderArchivePort;
pub use broker_port::{BrokerError, BrokerPort, OrderWithControls};
pub use controls_port::TradeControlsPort;
pub use errors::PortError;
pub use override_port::{DelayDaysStorePort, OverrideStorePort};
pub use position_port::PositionStorePort;
