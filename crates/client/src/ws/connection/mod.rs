//! WebSocket connection with state management and auto-reconnect.
//!
//! This module provides the shared types (state, backoff policy, events and
//! errors) and includes the tokio-tungstenite implementation.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use thiserror::Error;

/// Connection state for the telemetry WebSocket
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Created, `start` not called yet
    Idle,
    /// Handshake in flight (`attempt` is 0 for the first try)
    Connecting { attempt: u32 },
    Open,
    /// Dropped unexpectedly, waiting `delay` before the next attempt
    Reconnecting { attempt: u32, delay: Duration },
    /// `stop` is tearing the connection down
    Closing,
    /// Terminal
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting { .. } | ConnectionState::Reconnecting { .. }
        )
    }

    /// Whether `start` has been called and `stop` has not.
    pub fn is_active(&self) -> bool {
        self.is_connected() || self.is_connecting()
    }
}

/// Lifecycle events emitted by the connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened,
    /// `expected` is true only when the close was caused by `stop`
    Closed { expected: bool },
    /// A decoded text frame
    Message(Value),
    /// Transport failure, always followed by a reconnect attempt
    Error(String),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported scheme '{0}', expected ws or wss")]
    UnsupportedScheme(String),
    #[error("connection was stopped and cannot be restarted")]
    Stopped,
    #[error("start must be called from within a tokio runtime")]
    NoRuntime,
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Random spread as a fraction of the base delay (0.0 = none)
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30000),
            backoff_multiplier: 1.5,
            jitter: 0.2,
        }
    }
}

impl ReconnectConfig {
    /// Calculate the un-jittered delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Backoff schedule for one connection.
///
/// Delays never decrease between resets and never exceed `max_delay`, with or
/// without jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempt: u32,
    last_delay: Duration,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt: 0,
            last_delay: Duration::ZERO,
        }
    }

    /// Number of delays handed out since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last_delay = Duration::ZERO;
    }

    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    pub fn next_delay_with<R: Rng>(&mut self, rng: &mut R) -> Duration {
        let base = self.config.delay_for_attempt(self.attempt);
        let jitter = self.config.jitter.clamp(0.0, 1.0);

        let jittered = if jitter > 0.0 {
            let spread = base.as_secs_f64() * jitter;
            let offset = rng.gen_range(-spread..=spread);
            Duration::from_secs_f64((base.as_secs_f64() + offset).max(0.0))
        } else {
            base
        };

        let delay = jittered.max(self.last_delay).min(self.config.max_delay);
        self.last_delay = delay;
        self.attempt = self.attempt.saturating_add(1);
        delay
    }
}

// Include the native implementation
mod connection_native;
pub use connection_native::ConnectionManager;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(jitter: f64) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            backoff_multiplier: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = config(0.0);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_without_jitter() {
        let mut backoff = Backoff::new(config(0.0));
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 2000, 2000]);
        assert_eq!(backoff.attempt(), 7);
    }

    #[test]
    fn test_backoff_non_decreasing_with_jitter() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut backoff = Backoff::new(config(0.5));
        let mut previous = Duration::ZERO;

        for _ in 0..50 {
            let delay = backoff.next_delay_with(&mut rng);
            assert!(delay >= previous, "{:?} < {:?}", delay, previous);
            assert!(delay <= Duration::from_millis(2000));
            previous = delay;
        }
        assert_eq!(previous, Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(config(0.0));
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_near_base() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut backoff = Backoff::new(config(0.2));
        let first = backoff.next_delay_with(&mut rng);
        assert!(first >= Duration::from_millis(80) && first <= Duration::from_millis(120));
    }

    #[test]
    fn test_state_predicates() {
        assert!(ConnectionState::Open.is_connected());
        assert!(ConnectionState::Connecting { attempt: 0 }.is_connecting());
        assert!(ConnectionState::Reconnecting {
            attempt: 2,
            delay: Duration::from_secs(1)
        }
        .is_active());
        assert!(!ConnectionState::Idle.is_active());
        assert!(!ConnectionState::Closed.is_active());
    }
}
