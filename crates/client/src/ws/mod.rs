//! WebSocket module for real-time visitor telemetry.
//!
//! This module provides:
//! - Connection management with auto-reconnect
//! - Direct writes to the visitor store (consumers read the store, not events)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    VisitorFeed                      │
//! │   (owns one connection and the store it feeds)      │
//! └─────────────────────────────────────────────────────┘
//!                         │
//!                         ▼
//!                ┌──────────────────┐
//!                │ConnectionManager │  opened / closed / message / error
//!                └──────────────────┘
//!                         │
//!                         ▼
//!              ┌─────────────────────┐
//!              │    VisitorStore     │
//!              │ {connected, visitor}│
//!              └─────────────────────┘
//!                         │
//!          ┌──────────────┼──────────────┐
//!          ▼              ▼              ▼
//!   ┌────────────┐ ┌────────────┐ ┌────────────┐
//!   │  Observer  │ │  Observer  │ │  Observer  │
//!   └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let feed = VisitorFeed::new(ClientConfig::from_env());
//! feed.store().subscribe(|snapshot| render(snapshot));
//! feed.start()?;
//! // ...
//! feed.stop().await;
//! ```

pub mod connection;
pub mod manager;

pub use connection::{
    Backoff, ConnectionError, ConnectionEvent, ConnectionManager, ConnectionState, ReconnectConfig,
};
pub use manager::VisitorFeed;
