//! The uniform JSON wrapper for every response.
//!
//! ```json
//! { "success": true, "data": { ... }, "timestamp": "2024-05-01T10:00:00.000Z" }
//! { "success": false, "error": "Invalid API key", "details": [ ... ], "timestamp": "..." }
//! ```
//!
//! `details` is omitted when there is nothing to report. Timestamps are
//! ISO-8601 UTC with millisecond precision.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-visible message for every unexposed failure.
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// A success or error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `true` for the success shape.
    pub success: bool,

    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Structured error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,

    /// ISO-8601 UTC time the envelope was built.
    pub timestamp: String,
}

impl Envelope {
    /// Builds the success shape. A missing payload serializes as `null`.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            timestamp: timestamp(),
        }
    }

    /// Builds the error shape.
    #[must_use]
    pub fn error(message: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            details,
            timestamp: timestamp(),
        }
    }

    /// Builds the generic 500 body that never leaks internals.
    #[must_use]
    pub fn internal() -> Self {
        Self::error(INTERNAL_SERVER_ERROR, None)
    }

    /// Serializes the envelope to a JSON value.
    ///
    /// Same output as the `Serialize` derive: absent fields are omitted and
    /// `Some(Value::Null)` data is kept as `null`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Returns the current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let value = Envelope::success(json!({ "token": "t" })).to_value();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["token"], "t");
        assert!(value.get("error").is_none());
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_success_keeps_null_data() {
        let value = Envelope::success(Value::Null).to_value();
        assert!(value.as_object().unwrap().contains_key("data"));
        assert_eq!(value["data"], Value::Null);
    }

    #[test]
    fn test_error_shape_omits_empty_details() {
        let value = Envelope::error("Invalid API key", None).to_value();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Invalid API key");
        assert!(value.get("details").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_internal_is_generic() {
        let value = Envelope::internal().to_value();
        assert_eq!(value["error"], INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
        assert_eq!(ts.len(), "2024-05-01T10:00:00.000Z".len());
    }

    #[test]
    fn test_to_value_matches_serialize() {
        let decoded: Envelope =
            serde_json::from_value(json!({ "success": true, "timestamp": "t" })).unwrap();
        let value = decoded.to_value();

        assert_eq!(value, serde_json::to_value(&decoded).unwrap());
        assert_eq!(value, json!({ "success": true, "timestamp": "t" }));
    }

    #[test]
    fn test_deserialize_both_shapes() {
        let ok: Envelope =
            serde_json::from_value(json!({ "success": true, "data": [1], "timestamp": "t" })).unwrap();
        assert_eq!(ok.data, Some(json!([1])));

        let err: Envelope = serde_json::from_value(
            json!({ "success": false, "error": "x", "details": { "a": 1 }, "timestamp": "t" }),
        )
        .unwrap();
        assert_eq!(err.error.as_deref(), Some("x"));
        assert_eq!(err.details, Some(json!({ "a": 1 })));
    }
}
