//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - `persistence/`: in-memory order stores and store ports
//! - `broker/`: paper broker
//! - `config/`: dependency container

pub mod broker;
pub mod config;
pub mod persistence;
