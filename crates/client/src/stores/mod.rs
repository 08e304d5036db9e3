//! Stores for application state.

pub mod visitor;

pub use visitor::{SubscriptionId, VisitorSnapshot, VisitorStore};
