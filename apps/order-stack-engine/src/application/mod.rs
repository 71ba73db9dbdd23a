//! Application Layer
//!
//! Ports to the outside world, execution algos, services and the stack
//! handler use case that drives orders through their life.

pub mod algos;
pub mod ports;
pub mod services;
pub mod stack_handler;
