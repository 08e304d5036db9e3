//! Native WebSocket implementation using tokio-tungstenite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;
use yourinfo_shared::decode_frame;

use super::{Backoff, ConnectionError, ConnectionEvent, ConnectionState, ReconnectConfig};

/// Give up on a handshake that takes longer than this
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `stop` waits for the close frame to be flushed
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callback receiving every lifecycle event, in order, from the connection task
pub type EventHandler = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;

/// One logical connection to a telemetry endpoint.
///
/// A background task owns the socket: it connects, forwards decoded frames to
/// the event handler and reconnects with backoff after unexpected closes.
/// `stop` ends the task for good.
pub struct ConnectionManager {
    reconnect_config: ReconnectConfig,
    ping_interval: Option<Duration>,
    /// Current connection state, shared with the task
    state: Arc<watch::Sender<ConnectionState>>,
    /// Event callback
    on_event: EventHandler,
    /// Set once the manager is torn down; the task drops events after that
    halted: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    task: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
    stopped: bool,
}

impl ConnectionManager {
    /// Create a new, idle connection manager
    pub fn new(
        reconnect_config: ReconnectConfig,
        ping_interval: Option<Duration>,
        on_event: impl Fn(ConnectionEvent) + Send + Sync + 'static,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            reconnect_config,
            ping_interval,
            state: Arc::new(state),
            on_event: Arc::new(on_event),
            halted: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Begin connecting to `url`.
    ///
    /// No-op while a connection task is already running. Fails if the url is
    /// not a ws/wss url, if the manager was stopped, or if called outside a
    /// tokio runtime.
    pub fn start(&self, url: &str) -> Result<(), ConnectionError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        if lifecycle.stopped {
            return Err(ConnectionError::Stopped);
        }
        if lifecycle.task.is_some() {
            crate::log_debug!("start({}) ignored, connection already running", url);
            return Ok(());
        }

        let url = validate_url(url)?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ConnectionError::NoRuntime)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(run_connection_loop(
            url.to_string(),
            self.state.clone(),
            Emitter {
                on_event: self.on_event.clone(),
                halted: self.halted.clone(),
            },
            self.reconnect_config.clone(),
            self.ping_interval,
            shutdown_rx,
        ));

        lifecycle.task = Some(task);
        lifecycle.shutdown = Some(shutdown_tx);
        Ok(())
    }

    /// Close the connection and cancel any pending reconnect.
    ///
    /// Safe to call in any state and more than once. When this returns the
    /// socket is closed, no timer is outstanding and no further events will
    /// be emitted.
    pub async fn stop(&self) {
        let (task, shutdown) = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            lifecycle.stopped = true;
            (lifecycle.task.take(), lifecycle.shutdown.take())
        };

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }

        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    crate::log_error!("Connection task panicked: {}", e);
                }
            }
        }

        self.halted.store(true, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Closed);
        crate::log_info!("Connection stopped");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.halted.store(true, Ordering::SeqCst);
        let lifecycle = self.lifecycle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = lifecycle.task.take() {
            task.abort();
        }

        // The aborted task never reports the close, so do it here
        let was_open = matches!(
            *self.state.borrow(),
            ConnectionState::Open | ConnectionState::Closing
        );
        self.state.send_replace(ConnectionState::Closed);
        if was_open {
            crate::log_info!("Connection dropped while open");
            (self.on_event)(ConnectionEvent::Closed { expected: true });
        }
    }
}

fn validate_url(raw: &str) -> Result<Url, ConnectionError> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConnectionError::UnsupportedScheme(other.to_string())),
    }
}

/// Event sink for the task, muted once the manager is torn down
#[derive(Clone)]
struct Emitter {
    on_event: EventHandler,
    halted: Arc<AtomicBool>,
}

impl Emitter {
    fn emit(&self, event: ConnectionEvent) {
        if self.halted.load(Ordering::SeqCst) {
            crate::log_debug!("Dropping {:?} emitted after teardown", event);
            return;
        }
        (self.on_event)(event);
    }
}

/// How an open connection ended
enum Closure {
    /// `stop` was called
    Stopped,
    /// Peer closed the stream
    Remote,
    Failed(tungstenite::Error),
}

/// Connection management loop, runs until shutdown is signalled
async fn run_connection_loop(
    url: String,
    state: Arc<watch::Sender<ConnectionState>>,
    emitter: Emitter,
    reconnect_config: ReconnectConfig,
    ping_interval: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::new(reconnect_config);

    loop {
        if *shutdown.borrow() {
            break;
        }

        state.send_replace(ConnectionState::Connecting {
            attempt: backoff.attempt(),
        });
        crate::log_info!("Connecting to {} (attempt {})", url, backoff.attempt());

        let connected = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            result = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str())) => result,
        };

        match connected {
            Ok(Ok((ws_stream, _response))) => {
                backoff.reset();
                state.send_replace(ConnectionState::Open);
                crate::log_info!("WebSocket connected to {}", url);
                emitter.emit(ConnectionEvent::Opened);

                match read_until_closed(ws_stream, &emitter, &state, ping_interval, &mut shutdown)
                    .await
                {
                    Closure::Stopped => {
                        emitter.emit(ConnectionEvent::Closed { expected: true });
                        break;
                    }
                    Closure::Remote => {
                        crate::log_warn!("WebSocket to {} closed by peer", url);
                        emitter.emit(ConnectionEvent::Closed { expected: false });
                    }
                    Closure::Failed(e) => {
                        crate::log_error!("WebSocket read error for {}: {}", url, e);
                        emitter.emit(ConnectionEvent::Error(ConnectionError::from(e).to_string()));
                        emitter.emit(ConnectionEvent::Closed { expected: false });
                    }
                }
            }
            Ok(Err(e)) => {
                crate::log_error!("WebSocket error for {}: {}", url, e);
                emitter.emit(ConnectionEvent::Error(ConnectionError::from(e).to_string()));
            }
            Err(_) => {
                crate::log_error!("WebSocket handshake with {} timed out", url);
                emitter.emit(ConnectionEvent::Error(format!(
                    "handshake timed out after {:?}",
                    CONNECT_TIMEOUT
                )));
            }
        }

        // Wait before reconnecting
        let delay = backoff.next_delay();
        state.send_replace(ConnectionState::Reconnecting {
            attempt: backoff.attempt(),
            delay,
        });
        crate::log_info!(
            "Reconnecting to {} in {}ms (attempt {})",
            url,
            delay.as_millis(),
            backoff.attempt()
        );

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    crate::log_debug!("Connection loop for {} finished", url);
}

/// Pump frames from an open socket until it closes or shutdown is signalled
async fn read_until_closed(
    mut ws_stream: WsStream,
    emitter: &Emitter,
    state: &watch::Sender<ConnectionState>,
    ping_interval: Option<Duration>,
    shutdown: &mut watch::Receiver<bool>,
) -> Closure {
    let mut ping = ping_interval.filter(|p| !p.is_zero()).map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                state.send_replace(ConnectionState::Closing);
                match tokio::time::timeout(CLOSE_TIMEOUT, ws_stream.close(None)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => crate::log_debug!("Close handshake failed: {}", e),
                    Err(_) => crate::log_debug!("Close handshake timed out"),
                }
                return Closure::Stopped;
            }
            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text(text.as_str(), emitter),
                Some(Ok(Message::Close(frame))) => {
                    crate::log_info!("WebSocket received close frame: {:?}", frame);
                    return Closure::Remote;
                }
                Some(Ok(Message::Ping(data))) => {
                    // Pong is handled automatically by tungstenite
                    crate::log_debug!("Received ping: {:?}", data);
                }
                Some(Ok(_)) => {
                    // Ignore binary, pong, etc.
                }
                Some(Err(e)) => return Closure::Failed(e),
                None => return Closure::Remote,
            },
            _ = next_tick(&mut ping) => {
                if let Err(e) = ws_stream.send(Message::Ping(Vec::new().into())).await {
                    return Closure::Failed(e);
                }
            }
        }
    }
}

fn handle_text(text: &str, emitter: &Emitter) {
    crate::log_debug!("WebSocket received {} bytes", text.len());
    match decode_frame(text) {
        Ok(payload) => emitter.emit(ConnectionEvent::Message(payload)),
        Err(e) => crate::log_warn!("Dropping telemetry frame: {}", e),
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (Arc<Mutex<Vec<ConnectionEvent>>>, ConnectionManager) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let manager = ConnectionManager::new(ReconnectConfig::default(), None, move |event| {
            sink.lock().unwrap().push(event)
        });
        (events, manager)
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("ws://localhost:3000/ws").is_ok());
        assert!(validate_url(" wss://example.com/feed ").is_ok());
        assert!(matches!(
            validate_url("http://example.com"),
            Err(ConnectionError::UnsupportedScheme(s)) if s == "http"
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(ConnectionError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_new_manager_is_idle() {
        let (_, manager) = recording();
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_drop_reports_close_only_when_open() {
        let (events, manager) = recording();
        drop(manager);
        assert!(events.lock().unwrap().is_empty());

        let (events, manager) = recording();
        manager.state.send_replace(ConnectionState::Open);
        drop(manager);
        assert_eq!(
            *events.lock().unwrap(),
            vec![ConnectionEvent::Closed { expected: true }]
        );
    }

    #[test]
    fn test_start_outside_runtime() {
        let (_, manager) = recording();
        assert!(matches!(
            manager.start("ws://127.0.0.1:9"),
            Err(ConnectionError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_bad_url() {
        let (_, manager) = recording();
        assert!(manager.start("ftp://example.com").is_err());
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let (events, manager) = recording();
        manager.stop().await;
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(events.lock().unwrap().is_empty());
        assert!(matches!(
            manager.start("ws://127.0.0.1:9"),
            Err(ConnectionError::Stopped)
        ));
    }

    #[test]
    fn test_emitter_mutes_after_halt() {
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        let emitter = Emitter {
            on_event: Arc::new(move |_| *sink.lock().unwrap() += 1),
            halted: Arc::new(AtomicBool::new(false)),
        };

        emitter.emit(ConnectionEvent::Opened);
        emitter.halted.store(true, Ordering::SeqCst);
        emitter.emit(ConnectionEvent::Closed { expected: false });

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_handle_text_drops_malformed() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let emitter = Emitter {
            on_event: Arc::new(move |e| sink.lock().unwrap().push(e)),
            halted: Arc::new(AtomicBool::new(false)),
        };

        handle_text("", &emitter);
        handle_text("{broken", &emitter);
        handle_text(r#"{"server":{}}"#, &emitter);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            ConnectionEvent::Message(serde_json::json!({"server": {}}))
        );
    }
}
