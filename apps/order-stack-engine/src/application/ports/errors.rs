//! Errors shared by the store ports.

use thiserror::Error;

/// Failure of a position, override, delay-days, controls or archive store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// Record does not exist.
    #[error("{what} not found: {key}")]
    NotFound {
        /// Kind of record.
        what: &'static str,
        /// Lookup key.
        key: String,
    },

    /// Backend failure.
    #[error("store error: {message}")]
    Backend {
        /// Error details.
        message: String,
    },
}
