//! Telemetry frame decoding and validation.
//!
//! Inbound frames are UTF-8 JSON. Decoding and validation are separate steps:
//! the connection layer only decodes, the visitor store validates.

use serde_json::Value;

use crate::error::TelemetryError;
use crate::models::VisitorInfo;

/// Decode one text frame into a JSON value.
pub fn decode_frame(text: &str) -> Result<Value, TelemetryError> {
    if text.trim().is_empty() {
        return Err(TelemetryError::EmptyFrame);
    }
    Ok(serde_json::from_str(text)?)
}

/// Validate a decoded payload and convert it into a [`VisitorInfo`].
///
/// The payload must be an object with a `server` object. Everything else is
/// optional, but fields that are present must have the expected types.
pub fn validate_visitor(payload: Value) -> Result<VisitorInfo, TelemetryError> {
    let Some(object) = payload.as_object() else {
        return Err(TelemetryError::InvalidShape(format!(
            "expected an object, got {}",
            json_kind(&payload)
        )));
    };

    match object.get("server") {
        None | Some(Value::Null) => return Err(TelemetryError::MissingServer),
        Some(Value::Object(_)) => {}
        Some(other) => {
            return Err(TelemetryError::InvalidShape(format!(
                "server must be an object, got {}",
                json_kind(other)
            )))
        }
    }

    serde_json::from_value(payload).map_err(|e| TelemetryError::InvalidShape(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServerInfo;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_empty_frame() {
        assert!(matches!(decode_frame(""), Err(TelemetryError::EmptyFrame)));
        assert!(matches!(decode_frame("  \n"), Err(TelemetryError::EmptyFrame)));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_frame("{not json"), Err(TelemetryError::Decode(_))));
    }

    #[test]
    fn test_missing_server() {
        let err = validate_visitor(json!({"client": {"fingerprintId": "abc"}})).unwrap_err();
        assert!(matches!(err, TelemetryError::MissingServer));

        let err = validate_visitor(json!({"server": null})).unwrap_err();
        assert!(matches!(err, TelemetryError::MissingServer));
    }

    #[test]
    fn test_non_object_payloads() {
        assert!(matches!(
            validate_visitor(json!([1, 2, 3])),
            Err(TelemetryError::InvalidShape(_))
        ));
        assert!(matches!(
            validate_visitor(json!({"server": "1.2.3.4"})),
            Err(TelemetryError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_wrong_field_type() {
        let err = validate_visitor(json!({
            "server": {"ip": "1.2.3.4"},
            "client": {"hardwareConcurrency": "eight"}
        }))
        .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidShape(_)));
    }

    #[test]
    fn test_decode_then_validate() {
        let frame = decode_frame(r#"{"server":{"ip":"1.2.3.4","userAgent":"X"}}"#).unwrap();
        let visitor = validate_visitor(frame).unwrap();
        assert_eq!(
            visitor,
            VisitorInfo::from_server(ServerInfo {
                ip: Some("1.2.3.4".to_string()),
                user_agent: Some("X".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_empty_server_envelope_is_valid() {
        let visitor = validate_visitor(decode_frame(r#"{"server":{}}"#).unwrap()).unwrap();
        assert_eq!(visitor.server, ServerInfo::default());
    }
}
