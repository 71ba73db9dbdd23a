//! Trading controls: overrides and stop-loss delay days.

mod delay_days;
mod overrides;

pub use delay_days::DelayDays;
pub use overrides::Override;
