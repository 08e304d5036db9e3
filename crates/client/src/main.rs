//! YourInfo Client - Main entry point
//!
//! Connects to a telemetry endpoint and logs every snapshot change.
//!
//! Usage: `yourinfo-client [ws-url]` (falls back to `YOURINFO_WS_URL`).

use yourinfo_client::{logging, ClientConfig, VisitorFeed, VisitorSnapshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ClientConfig::from_args_or_env(std::env::args().nth(1));
    let feed = VisitorFeed::new(config);

    feed.store().subscribe(|snapshot| {
        yourinfo_client::log_info!("{}", summarize(snapshot));
    });

    feed.start()?;
    yourinfo_client::log_info!("Listening for visitor telemetry on {}", feed.url());

    tokio::signal::ctrl_c().await?;
    yourinfo_client::log_info!("Shutting down");
    feed.stop().await;

    Ok(())
}

/// One-line description of a snapshot
fn summarize(snapshot: &VisitorSnapshot) -> String {
    let status = if snapshot.connected {
        "connected"
    } else {
        "disconnected"
    };

    let Some(visitor) = snapshot.current_visitor.as_deref() else {
        return format!("[{}] waiting for visitor data", status);
    };

    let location = visitor
        .server
        .geo
        .as_ref()
        .and_then(|geo| geo.location_label())
        .unwrap_or_else(|| "unknown location".to_string());

    format!(
        "[{}] visitor {} from {} ({})",
        status,
        visitor.fingerprint_id().unwrap_or("N/A"),
        visitor.ip().unwrap_or("N/A"),
        location
    )
}
