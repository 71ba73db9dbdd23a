//! Cooldown counter applied after a stop-loss fires.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// Number of days normal trading stays suspended for an (instrument, strategy)
/// after a stop-loss fill. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DelayDays(u32);

impl DelayDays {
    /// Counter starting at `days`.
    #[must_use]
    pub const fn new(days: u32) -> Self {
        Self(days)
    }

    /// No delay.
    #[must_use]
    pub const fn no_delay() -> Self {
        Self(0)
    }

    /// Rebuild from a stored numeric value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` for negative or oversized values.
    pub fn from_numeric_value(value: i64) -> Result<Self, DomainError> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| DomainError::InvalidValue {
                field: "delay_days".to_string(),
                message: format!("{value} is not a valid day count"),
            })
    }

    /// Value for storage.
    #[must_use]
    pub fn as_numeric_value(self) -> i64 {
        i64::from(self.0)
    }

    /// Days remaining.
    #[must_use]
    pub const fn days(self) -> u32 {
        self.0
    }

    /// True when no delay remains.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Count down by one day.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` when already at zero; the
    /// value is left unchanged.
    pub fn decrease(&mut self) -> Result<(), DomainError> {
        match self.0.checked_sub(1) {
            Some(days) => {
                self.0 = days;
                Ok(())
            }
            None => Err(DomainError::InvariantViolation {
                entity: "DelayDays".to_string(),
                invariant: "delay days never go below zero".to_string(),
                state: "0".to_string(),
            }),
        }
    }
}

impl fmt::Display for DelayDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decrease_at_zero_fails_and_stays_zero() {
        let mut days = DelayDays::no_delay();
        assert!(days.decrease().is_err());
        assert_eq!(days, DelayDays::new(0));
    }

    #[test]
    fn negative_numeric_value_rejected() {
        assert!(DelayDays::from_numeric_value(-1).is_err());
        assert_eq!(DelayDays::from_numeric_value(3).unwrap(), DelayDays::new(3));
    }

    #[test]
    fn default_is_no_delay() {
        assert!(DelayDays::default().is_zero());
    }

    proptest! {
        #[test]
        fn decrease_counts_down_by_one(d in 1u32..10_000) {
            let mut days = DelayDays::new(d);
            prop_assert!(days.decrease().is_ok());
            prop_assert_eq!(days.days(), d - 1);
        }

        #[test]
        fn numeric_round_trip(d in 0u32..100_000) {
            let days = DelayDays::new(d);
            prop_assert_eq!(DelayDays::from_numeric_value(days.as_numeric_value()).unwrap(), days);

            let json = serde_json::to_string(&days).unwrap();
            let back: DelayDays = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, days);
        }
    }
}
