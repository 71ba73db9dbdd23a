//! Domain layer: orders, stacks and trading controls, free of I/O.

pub mod controls;
pub mod order_stack;
pub mod orders;
pub mod shared;
