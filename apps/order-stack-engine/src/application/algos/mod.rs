//! Execution algos.
//!
//! An algo turns a gated contract order into a placed broker order. The set
//! of algos is closed; configuration names one by [`AlgoId`] and the name is
//! resolved through [`AlgoRegistry`] once, at startup.

mod market;
mod stop;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{BrokerError, BrokerPort, OrderWithControls};
use crate::domain::orders::ContractOrder;

pub use market::MarketAlgo;
pub use stop::StopAlgo;

/// An execution algo.
#[async_trait]
pub trait ExecutionAlgo: Send + Sync {
    /// Identifier recorded on the broker orders this algo places.
    fn id(&self) -> AlgoId;

    /// Place a broker order for `contract_order`; `None` if nothing was
    /// submitted.
    async fn submit_trade(
        &self,
        contract_order: &ContractOrder,
    ) -> Result<Option<OrderWithControls>, BrokerError>;
}

/// Known algo identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgoId {
    /// Single stop order for the whole amount at the stop price.
    AlgoStop,
    /// Market order for the whole amount.
    AlgoMarket,
}

impl AlgoId {
    /// Configuration name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AlgoStop => "algo_stop",
            Self::AlgoMarket => "algo_market",
        }
    }
}

impl fmt::Display for AlgoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlgoId {
    type Err = AlgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "algo_stop" => Ok(Self::AlgoStop),
            "algo_market" => Ok(Self::AlgoMarket),
            other => Err(AlgoError::UnknownAlgo(other.to_string())),
        }
    }
}

/// Algo resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlgoError {
    /// Name does not match any known algo.
    #[error("unknown execution algo '{0}'")]
    UnknownAlgo(String),
    /// Known id without a registered constructor.
    #[error("execution algo '{0}' is not registered")]
    NotRegistered(AlgoId),
}

type AlgoConstructor = fn(Arc<dyn BrokerPort>) -> Arc<dyn ExecutionAlgo>;

/// Maps algo ids to constructors.
pub struct AlgoRegistry {
    constructors: HashMap<AlgoId, AlgoConstructor>,
}

impl fmt::Debug for AlgoRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&AlgoId> = self.constructors.keys().collect();
        ids.sort_by_key(|id| id.as_str());
        f.debug_struct("AlgoRegistry").field("algos", &ids).finish()
    }
}

impl Default for AlgoRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(AlgoId::AlgoStop, build_stop_algo);
        registry.register(AlgoId::AlgoMarket, build_market_algo);
        registry
    }
}

fn build_stop_algo(broker: Arc<dyn BrokerPort>) -> Arc<dyn ExecutionAlgo> {
    Arc::new(StopAlgo::new(broker))
}

fn build_market_algo(broker: Arc<dyn BrokerPort>) -> Arc<dyn ExecutionAlgo> {
    Arc::new(MarketAlgo::new(broker))
}

impl AlgoRegistry {
    /// Registry with no algos.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register or replace a constructor.
    pub fn register(&mut self, id: AlgoId, constructor: AlgoConstructor) {
        self.constructors.insert(id, constructor);
    }

    /// Build the algo named `name`.
    ///
    /// # Errors
    ///
    /// Returns `AlgoError::UnknownAlgo` or `AlgoError::NotRegistered`.
    pub fn resolve(&self, name: &str, broker: Arc<dyn BrokerPort>) -> Result<Arc<dyn ExecutionAlgo>, AlgoError> {
        let id: AlgoId = name.parse()?;
        let constructor = self
            .constructors
            .get(&id)
            .ok_or(AlgoError::NotRegistered(id))?;
        Ok(constructor(broker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::broker::PaperBroker;

    #[test]
    fn algo_ids_parse_and_display() {
        assert_eq!("algo_stop".parse::<AlgoId>().unwrap(), AlgoId::AlgoStop);
        assert_eq!(AlgoId::AlgoMarket.to_string(), "algo_market");
        assert!(matches!(
            "sysexecution.algos.algo_stop".parse::<AlgoId>(),
            Err(AlgoError::UnknownAlgo(_))
        ));
    }

    #[test]
    fn registry_resolves_known_algos_only() {
        let broker: Arc<dyn BrokerPort> = Arc::new(PaperBroker::new());
        let registry = AlgoRegistry::default();
        assert_eq!(
            registry.resolve("algo_stop", Arc::clone(&broker)).unwrap().id(),
            AlgoId::AlgoStop
        );
        assert!(registry.resolve("algo_twap", Arc::clone(&broker)).is_err());

        let empty = AlgoRegistry::empty();
        assert!(matches!(
            empty.resolve("algo_market", broker),
            Err(AlgoError::NotRegistered(AlgoId::AlgoMarket))
        ));
    }
}
