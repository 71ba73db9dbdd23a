//! Signed per-leg trade quantities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// A signed quantity per leg.
///
/// Outright orders have one leg; spread orders (e.g. a roll trading the old
/// and new contract at once) have one entry per leg. Positive is a buy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeQuantity(Vec<i64>);

impl TradeQuantity {
    /// Outright quantity.
    #[must_use]
    pub fn single(qty: i64) -> Self {
        Self(vec![qty])
    }

    /// Quantity with one entry per leg.
    #[must_use]
    pub fn from_legs(legs: Vec<i64>) -> Self {
        Self(legs)
    }

    /// All-zero quantity with the same number of legs.
    #[must_use]
    pub fn zero_like(&self) -> Self {
        Self(vec![0; self.0.len()])
    }

    /// Per-leg values.
    #[must_use]
    pub fn legs(&self) -> &[i64] {
        &self.0
    }

    /// Quantity for one leg.
    #[must_use]
    pub fn leg(&self, index: usize) -> Option<i64> {
        self.0.get(index).copied()
    }

    /// Number of legs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no legs at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True for multi-leg quantities.
    #[must_use]
    pub fn is_spread(&self) -> bool {
        self.0.len() > 1
    }

    /// The single leg's value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` for spread quantities.
    pub fn as_single_trade_qty_or_error(&self) -> Result<i64, DomainError> {
        match self.0.as_slice() {
            [qty] => Ok(*qty),
            _ => Err(DomainError::InvalidValue {
                field: "trade".to_string(),
                message: format!("expected a single leg, got {self}"),
            }),
        }
    }

    /// True when every leg is zero.
    #[must_use]
    pub fn equals_zero(&self) -> bool {
        self.0.iter().all(|q| *q == 0)
    }

    /// Sum of absolute leg sizes.
    #[must_use]
    pub fn total_abs_qty(&self) -> u64 {
        self.0.iter().map(|q| q.unsigned_abs()).sum()
    }

    /// Signed sum across legs.
    #[must_use]
    pub fn total_qty(&self) -> i64 {
        self.0.iter().sum()
    }

    /// Leg-wise negation.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self(self.0.iter().map(|q| -q).collect())
    }

    /// Leg-wise difference `self - other`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` when the leg counts differ.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, DomainError> {
        self.ensure_same_shape(other)?;
        Ok(Self(
            self.0.iter().zip(&other.0).map(|(a, b)| a - b).collect(),
        ))
    }

    /// Leg-wise sum.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` when the leg counts differ.
    pub fn checked_add(&self, other: &Self) -> Result<Self, DomainError> {
        self.ensure_same_shape(other)?;
        Ok(Self(
            self.0.iter().zip(&other.0).map(|(a, b)| a + b).collect(),
        ))
    }

    /// True if `fill` is larger than `self` on any leg, or trades in the
    /// opposite direction.
    ///
    /// A fill of a different shape always exceeds.
    #[must_use]
    pub fn is_exceeded_by(&self, fill: &Self) -> bool {
        if self.0.len() != fill.0.len() {
            return true;
        }
        self.0.iter().zip(&fill.0).any(|(trade, fill)| {
            *fill != 0 && (fill.signum() != trade.signum() || fill.abs() > trade.abs())
        })
    }

    /// Scale every leg down so the total absolute size does not exceed
    /// `max_abs_qty`, rounding each leg towards zero.
    #[must_use]
    pub fn scaled_to_abs_limit(&self, max_abs_qty: u64) -> Self {
        let total = self.total_abs_qty();
        if total <= max_abs_qty {
            return self.clone();
        }
        if max_abs_qty == 0 {
            return self.zero_like();
        }
        Self(
            self.0
                .iter()
                .map(|q| {
                    let scaled = u128::from(q.unsigned_abs()) * u128::from(max_abs_qty)
                        / u128::from(total);
                    q.signum() * scaled as i64
                })
                .collect(),
        )
    }

    fn ensure_same_shape(&self, other: &Self) -> Result<(), DomainError> {
        if self.0.len() == other.0.len() {
            Ok(())
        } else {
            Err(DomainError::InvalidValue {
                field: "trade".to_string(),
                message: format!("leg count mismatch: {self} vs {other}"),
            })
        }
    }
}

impl From<i64> for TradeQuantity {
    fn from(value: i64) -> Self {
        Self::single(value)
    }
}

impl fmt::Display for TradeQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [qty] => write!(f, "{qty}"),
            legs => write!(f, "{legs:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn single_and_display() {
        let qty = TradeQuantity::single(-10);
        assert_eq!(qty.as_single_trade_qty_or_error().unwrap(), -10);
        assert_eq!(qty.to_string(), "-10");
        assert!(!qty.is_spread());
    }

    #[test]
    fn spread_is_not_single() {
        let qty = TradeQuantity::from_legs(vec![5, -5]);
        assert!(qty.is_spread());
        assert!(qty.as_single_trade_qty_or_error().is_err());
        assert_eq!(qty.to_string(), "[5, -5]");
        assert_eq!(qty.total_abs_qty(), 10);
        assert_eq!(qty.total_qty(), 0);
    }

    #[test]
    fn checked_sub_rejects_shape_mismatch() {
        let a = TradeQuantity::single(3);
        let b = TradeQuantity::from_legs(vec![1, 1]);
        assert!(a.checked_sub(&b).is_err());
        assert_eq!(
            TradeQuantity::single(7).checked_sub(&a).unwrap(),
            TradeQuantity::single(4)
        );
    }

    #[test_case(10, 10, false ; "exact fill")]
    #[test_case(10, 4, false ; "partial fill")]
    #[test_case(10, 12, true ; "overfill")]
    #[test_case(10, -1, true ; "wrong direction")]
    #[test_case(-10, -12, true ; "short overfill")]
    #[test_case(0, 1, true ; "fill against zero trade")]
    #[test_case(-10, 0, false ; "no fill")]
    fn exceeded_by(trade: i64, fill: i64, expected: bool) {
        assert_eq!(
            TradeQuantity::single(trade).is_exceeded_by(&TradeQuantity::single(fill)),
            expected
        );
    }

    #[test]
    fn scaled_to_abs_limit_rounds_towards_zero() {
        let qty = TradeQuantity::single(-10);
        assert_eq!(qty.scaled_to_abs_limit(20), qty);
        assert_eq!(qty.scaled_to_abs_limit(4), TradeQuantity::single(-4));
        assert_eq!(qty.scaled_to_abs_limit(0), TradeQuantity::single(0));

        let spread = TradeQuantity::from_legs(vec![3, -3]);
        assert_eq!(
            spread.scaled_to_abs_limit(3),
            TradeQuantity::from_legs(vec![1, -1])
        );
    }

    proptest! {
        #[test]
        fn scaled_never_exceeds_limit(trade in -1000i64..1000, limit in 0u64..2000) {
            let qty = TradeQuantity::single(trade);
            let scaled = qty.scaled_to_abs_limit(limit);
            prop_assert!(scaled.total_abs_qty() <= limit);
            prop_assert!(!qty.is_exceeded_by(&scaled));
        }
    }
}
