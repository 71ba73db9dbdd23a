//! Execution algo selection.

use serde::{Deserialize, Serialize};

/// Which algos handle which orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExecutionAlgosConfig {
    /// Algo used for stop-loss contract orders, e.g. `algo_stop`.
    #[serde(default)]
    pub stop_loss_algo: Option<String>,
}
