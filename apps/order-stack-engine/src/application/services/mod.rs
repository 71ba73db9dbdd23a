//! Application Services

mod delay_days;

pub use delay_days::DelayDaysService;
