//! Order stacks: keyed collections of orders at one hierarchy level.

mod completion;
mod errors;
mod stack;
mod store;

pub use completion::CompletionPolicy;
pub use errors::StackError;
pub use stack::OrderStack;
pub use store::{OrderStore, StoreError};
