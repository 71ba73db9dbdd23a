//! Delay Days Service
//!
//! Reads and counts down the cooldown that follows a stop-loss fill. Keys are
//! arbitrary override keys, usually `strategy/instrument`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::ports::{DelayDaysStorePort, PortError};
use crate::domain::controls::DelayDays;

/// Delay-days bookkeeping over a [`DelayDaysStorePort`].
pub struct DelayDaysService {
    store: Arc<dyn DelayDaysStorePort>,
}

impl DelayDaysService {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<dyn DelayDaysStorePort>) -> Self {
        Self { store }
    }

    /// Current delay for a key; no delay when none was ever set.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get_delay_days_for_stop_loss_override(
        &self,
        override_key: &str,
    ) -> Result<DelayDays, PortError> {
        Ok(self
            .store
            .get_delay_days(override_key)
            .await?
            .unwrap_or_default())
    }

    /// Count down one day. A counter already at zero stays at zero.
    ///
    /// Returns the value after the decrease.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn decrease_current_delay_for_override(
        &self,
        override_key: &str,
    ) -> Result<DelayDays, PortError> {
        let mut days = self.get_delay_days_for_stop_loss_override(override_key).await?;
        if let Err(e) = days.decrease() {
            debug!(override_key, error = %e, "Delay days already at zero");
            return Ok(days);
        }
        self.store.set_delay_days(override_key, days).await?;
        info!(override_key, remaining = %days, "Decreased delay days");
        Ok(days)
    }

    /// Overwrite the delay for a key.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn set_delay_days_for_stop_loss_override(
        &self,
        override_key: &str,
        days: DelayDays,
    ) -> Result<(), PortError> {
        self.store.set_delay_days(override_key, days).await
    }

    /// Remove the delay for a key.
    ///
    /// # Errors
    ///
    /// Returns `PortError::NotFound` if no delay is stored for the key.
    pub async fn delete_delay_days_for_stop_loss_override(
        &self,
        override_key: &str,
    ) -> Result<(), PortError> {
        self.store.delete_delay_days(override_key).await
    }
}
