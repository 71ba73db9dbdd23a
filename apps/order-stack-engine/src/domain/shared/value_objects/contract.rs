//! Futures contract and instrument/strategy keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifiers::{ContractDate, InstrumentCode, StrategyName};

/// A single futures contract: instrument plus expiry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuturesContract {
    /// Instrument code.
    pub instrument: InstrumentCode,
    /// Contract expiry key.
    pub contract_date: ContractDate,
}

impl FuturesContract {
    /// Create a contract from its parts.
    #[must_use]
    pub fn new(instrument: impl Into<InstrumentCode>, contract_date: impl Into<ContractDate>) -> Self {
        Self {
            instrument: instrument.into(),
            contract_date: contract_date.into(),
        }
    }
}

impl fmt::Display for FuturesContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.contract_date)
    }
}

/// An (instrument, strategy) pair.
///
/// This is the unit that positions, trade limits and overrides are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentStrategy {
    /// Strategy name.
    pub strategy: StrategyName,
    /// Instrument code.
    pub instrument: InstrumentCode,
}

impl InstrumentStrategy {
    /// Create a new pair.
    #[must_use]
    pub fn new(strategy: impl Into<StrategyName>, instrument: impl Into<InstrumentCode>) -> Self {
        Self {
            strategy: strategy.into(),
            instrument: instrument.into(),
        }
    }

    /// Storage key, also used as the override key for delay days.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.strategy, self.instrument)
    }
}

impl fmt::Display for InstrumentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
