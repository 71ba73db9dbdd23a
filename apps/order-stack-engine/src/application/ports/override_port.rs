//! Override and delay-days store ports.

use async_trait::async_trait;

use super::errors::PortError;
use crate::domain::controls::{DelayDays, Override};

/// Overrides keyed by (instrument, strategy) key.
#[async_trait]
pub trait OverrideStorePort: Send + Sync {
    /// Current override, `None` if no record exists.
    async fn get_override(&self, key: &str) -> Result<Option<Override>, PortError>;

    /// Write an override.
    async fn set_override(&self, key: &str, value: Override) -> Result<(), PortError>;
}

/// Delay-days counters keyed by override key.
#[async_trait]
pub trait DelayDaysStorePort: Send + Sync {
    /// Stored counter, `None` if absent.
    async fn get_delay_days(&self, key: &str) -> Result<Option<DelayDays>, PortError>;

    /// Write a counter.
    async fn set_delay_days(&self, key: &str, days: DelayDays) -> Result<(), PortError>;

    /// Remove a counter.
    async fn delete_delay_days(&self, key: &str) -> Result<(), PortError>;
}
