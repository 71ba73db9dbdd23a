//! Rich error handling for the stack handler.
//!
//! Every failure surfaced by a sweep step is a [`StackHandlerError`] carrying
//! an [`ErrorCode`] that decides how loudly it is reported.
//!
//! | Code | Fatal | Handling |
//! |------|-------|----------|
//! | `NOT_FOUND` | no | Handled where it occurs |
//! | `RECOVERABLE_ROLLBACK` | no | Order not created, next sweep retries |
//! | `FILL_EXCEEDS_REQUEST` | no | Fill discarded with a warning |
//! | `ORDER_LOCKED` | no | Order skipped |
//! | `INVALID_ORDER` | no | Order skipped |
//! | `BROKER_UNAVAILABLE` | no | Next sweep retries |
//! | `STORAGE_FAILURE` | no | Next sweep retries |
//! | `CONFIGURATION_MISSING` | yes | Logged critical, order processing stops |
//! | `INVALID_CONFIGURATION` | yes | Logged critical, order processing stops |
//! | `STACK_CORRUPTED` | yes | Logged critical, order processing stops |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{BrokerError, PortError};
use crate::domain::order_stack::StackError;
use crate::domain::orders::OrderError;
use crate::domain::shared::DomainError;

/// Error codes for the stack handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// An order, override or position does not exist.
    NotFound,
    /// A multi-order write failed and was undone.
    RecoverableRollback,
    /// A reported fill is larger than the open quantity.
    FillExceedsRequest,
    /// The order is owned by another executing agent.
    OrderLocked,
    /// An order rejected a requested change.
    InvalidOrder,
    /// A required configuration key is absent.
    ConfigurationMissing,
    /// Configuration values contradict each other or the order.
    InvalidConfiguration,
    /// A compensating action failed or a stack invariant is broken.
    StackCorrupted,
    /// The broker connection failed.
    BrokerUnavailable,
    /// A store failed.
    StorageFailure,
}

impl ErrorCode {
    /// Get the error reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::RecoverableRollback => "RECOVERABLE_ROLLBACK",
            Self::FillExceedsRequest => "FILL_EXCEEDS_REQUEST",
            Self::OrderLocked => "ORDER_LOCKED",
            Self::InvalidOrder => "INVALID_ORDER",
            Self::ConfigurationMissing => "CONFIGURATION_MISSING",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::StackCorrupted => "STACK_CORRUPTED",
            Self::BrokerUnavailable => "BROKER_UNAVAILABLE",
            Self::StorageFailure => "STORAGE_FAILURE",
        }
    }

    /// Fatal errors are logged at critical severity and abort processing of
    /// the affected order.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationMissing | Self::InvalidConfiguration | Self::StackCorrupted
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A rich error with context for the stack handler.
#[derive(Debug, Error)]
pub struct StackHandlerError {
    /// Error code.
    code: ErrorCode,
    /// Human-readable message.
    message: String,
    /// Additional context (key-value pairs).
    context: Vec<(String, String)>,
}

impl StackHandlerError {
    /// Create a new error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.push((key.into(), value.to_string()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Shorthand for `self.code().is_fatal()`.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }

    /// Context rendered as `key=value` pairs for log fields.
    #[must_use]
    pub fn context_string(&self) -> String {
        self.context
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for StackHandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}

/// Convenience constructors for common errors.
impl StackHandlerError {
    /// Required configuration key absent.
    #[must_use]
    pub fn configuration_missing(key: &str) -> Self {
        Self::new(
            ErrorCode::ConfigurationMissing,
            format!("{key} missing from configuration"),
        )
        .with_context("key", key)
    }

    /// Configuration contradicts the order being processed.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// Stack invariant broken or compensation failed.
    #[must_use]
    pub fn stack_corrupted(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StackCorrupted, message)
    }
}

impl From<StackError> for StackHandlerError {
    fn from(err: StackError) -> Self {
        let code = match &err {
            StackError::OrderNotFound { .. } => ErrorCode::NotFound,
            StackError::FillExceedsTrade { .. } => ErrorCode::FillExceedsRequest,
            StackError::AlreadyLocked { .. } => ErrorCode::OrderLocked,
            StackError::ChildrenAlreadyPresent { .. } | StackError::InvalidOrder { .. } => {
                ErrorCode::InvalidOrder
            }
            StackError::RollbackSucceeded { .. } => ErrorCode::RecoverableRollback,
            StackError::StackCorrupted { .. } => ErrorCode::StackCorrupted,
            StackError::Storage { .. } | StackError::Serialization { .. } => {
                ErrorCode::StorageFailure
            }
        };
        Self::new(code, err.to_string())
    }
}

impl From<BrokerError> for StackHandlerError {
    fn from(err: BrokerError) -> Self {
        Self::new(ErrorCode::BrokerUnavailable, err.to_string())
    }
}

impl From<PortError> for StackHandlerError {
    fn from(err: PortError) -> Self {
        let code = match &err {
            PortError::NotFound { .. } => ErrorCode::NotFound,
            PortError::Backend { .. } => ErrorCode::StorageFailure,
        };
        Self::new(code, err.to_string())
    }
}

impl From<OrderError> for StackHandlerError {
    fn from(err: OrderError) -> Self {
        let code = match &err {
            OrderError::FillExceedsTrade { .. } => ErrorCode::FillExceedsRequest,
            _ => ErrorCode::InvalidOrder,
        };
        Self::new(code, err.to_string())
    }
}

impl From<DomainError> for StackHandlerError {
    fn from(err: DomainError) -> Self {
        Self::new(ErrorCode::InvalidOrder, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::OrderId;

    #[test]
    fn fatal_codes() {
        assert!(ErrorCode::ConfigurationMissing.is_fatal());
        assert!(ErrorCode::InvalidConfiguration.is_fatal());
        assert!(ErrorCode::StackCorrupted.is_fatal());
        assert!(!ErrorCode::RecoverableRollback.is_fatal());
        assert!(!ErrorCode::FillExceedsRequest.is_fatal());
        assert!(!ErrorCode::NotFound.is_fatal());
    }

    #[test]
    fn error_creation_and_context() {
        let error = StackHandlerError::configuration_missing("stop_loss.catastrophic_level")
            .with_context("order_id", 7);

        assert_eq!(error.code(), ErrorCode::ConfigurationMissing);
        assert_eq!(error.context().len(), 2);
        assert!(error.context_string().contains("order_id=7"));
        assert!(error.is_fatal());
    }

    #[test]
    fn stack_errors_map_to_codes() {
        let err: StackHandlerError = StackError::RollbackSucceeded {
            stack: "broker".to_string(),
            reason: "disk full".to_string(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::RecoverableRollback);

        let err: StackHandlerError = StackError::OrderNotFound {
            stack: "contract".to_string(),
            order_id: OrderId::new(3),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn error_display() {
        let error = StackHandlerError::stack_corrupted("two live stops");
        assert_eq!(error.to_string(), "[STACK_CORRUPTED] two live stops");
    }
}
