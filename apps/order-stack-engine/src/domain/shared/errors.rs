//! Validation errors raised by value objects.

use thiserror::Error;

/// A value object refused a value or a change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The value cannot be represented, e.g. negative delay days or a trade
    /// with the wrong number of legs.
    #[error("invalid {field}: {message}")]
    InvalidValue {
        /// Offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// A requested change would break the value object's invariant.
    #[error("{entity} cannot change: {invariant} (currently {state})")]
    InvariantViolation {
        /// Value object type.
        entity: String,
        /// The invariant that would break.
        invariant: String,
        /// Current value.
        state: String,
    },
}
