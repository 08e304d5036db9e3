//! Wires a telemetry connection to the visitor store.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::stores::VisitorStore;

use super::connection::{ConnectionError, ConnectionManager, ConnectionState};

/// One telemetry session: a connection and the store it writes to.
///
/// Dropping the feed aborts the connection task; call [`VisitorFeed::stop`]
/// for an orderly close.
pub struct VisitorFeed {
    url: String,
    store: Arc<VisitorStore>,
    connection: ConnectionManager,
}

impl VisitorFeed {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_store(config, Arc::new(VisitorStore::new()))
    }

    /// Feed events into an existing store
    pub fn with_store(config: ClientConfig, store: Arc<VisitorStore>) -> Self {
        let store_for_events = store.clone();
        let connection = ConnectionManager::new(
            config.reconnect,
            config.ping_interval,
            move |event| store_for_events.handle_event(event),
        );

        Self {
            url: config.url,
            store,
            connection,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn store(&self) -> &Arc<VisitorStore> {
        &self.store
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Start connecting. Idempotent while running.
    pub fn start(&self) -> Result<(), ConnectionError> {
        crate::log_info!("Starting visitor feed for {}", self.url);
        self.connection.start(&self.url)
    }

    /// Stop the connection. The store keeps its last snapshot.
    pub async fn stop(&self) {
        self.connection.stop().await;
    }
}
