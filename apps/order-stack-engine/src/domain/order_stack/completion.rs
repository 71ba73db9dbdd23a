//! Completion policy for orders.

use crate::domain::orders::OrderBase;

/// Which fill states count as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionPolicy {
    /// A non-zero fill below the trade counts as complete.
    pub allow_partial: bool,
    /// A zero fill counts as complete.
    pub allow_zero: bool,
    /// A deactivated order counts as complete whatever its fill.
    pub treat_inactive_as_complete: bool,
}

impl CompletionPolicy {
    /// Only exactly filled orders are complete.
    pub const STRICT: Self = Self::new(false, false, false);

    /// Build a policy from its three flags.
    #[must_use]
    pub const fn new(allow_partial: bool, allow_zero: bool, treat_inactive_as_complete: bool) -> Self {
        Self {
            allow_partial,
            allow_zero,
            treat_inactive_as_complete,
        }
    }

    /// Whether `order` is complete under this policy.
    #[must_use]
    pub fn is_satisfied_by(&self, order: &OrderBase) -> bool {
        if self.treat_inactive_as_complete && !order.is_active() {
            return true;
        }
        if order.fill_equals_trade() {
            return true;
        }
        if order.fill_equals_zero() {
            return self.allow_zero;
        }
        self.allow_partial
    }
}
