//! Broker Adapters

mod paper;

pub use paper::PaperBroker;
