//! Logging macros for the client.
//!
//! Thin wrappers over `tracing` so every line from this crate is emitted
//! under the `yourinfo_client` target regardless of which module logged it.

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "yourinfo_client=info";

/// Install the global `tracing` subscriber.
pub fn init() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        ::tracing::info!(target: "yourinfo_client", $($arg)*)
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        ::tracing::error!(target: "yourinfo_client", $($arg)*)
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        ::tracing::warn!(target: "yourinfo_client", $($arg)*)
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "yourinfo_client", $($arg)*)
    };
}
