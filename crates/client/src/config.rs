//! Client configuration.

use std::time::Duration;

use crate::ws::ReconnectConfig;

/// Environment variable holding the telemetry endpoint.
pub const URL_ENV: &str = "YOURINFO_WS_URL";

/// Endpoint used when nothing else is configured.
pub const DEFAULT_URL: &str = "ws://localhost:3000/ws";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint pushing visitor telemetry
    pub url: String,
    /// Backoff policy for unexpected disconnects
    pub reconnect: ReconnectConfig,
    /// Send a ping this often while open (None = never)
    pub ping_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect: ReconnectConfig::default(),
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Read configuration from the environment.
    ///
    /// Environment variables:
    /// - `YOURINFO_WS_URL`: telemetry endpoint (default: "ws://localhost:3000/ws")
    pub fn from_env() -> Self {
        let url = std::env::var(URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        Self::new(url)
    }

    /// Use `url` if given, otherwise fall back to the environment.
    pub fn from_args_or_env(url: Option<String>) -> Self {
        match url {
            Some(url) => Self::new(url),
            None => Self::from_env(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.ping_interval = interval;
        self
    }
}
