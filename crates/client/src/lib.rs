//! YourInfo Client - real-time visitor telemetry
//!
//! This crate keeps a persistent WebSocket connection to a telemetry
//! endpoint and maintains the current visitor snapshot for presentation.

pub mod config;
pub mod logging;
pub mod stores;
pub mod ws;

pub use config::ClientConfig;
pub use stores::{SubscriptionId, VisitorSnapshot, VisitorStore};
pub use ws::{ConnectionEvent, ConnectionManager, ConnectionState, VisitorFeed};
