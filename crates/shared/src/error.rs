//! Telemetry error taxonomy.

use thiserror::Error;

/// Why an inbound telemetry frame was rejected.
///
/// None of these are fatal: the offending frame is dropped and processing
/// continues with the next one.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("empty telemetry frame")]
    EmptyFrame,
    #[error("frame is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("payload is missing the server envelope")]
    MissingServer,
    #[error("payload does not match the visitor shape: {0}")]
    InvalidShape(String),
}
