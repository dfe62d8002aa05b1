//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use trellis_middleware::{Envelope, HttpResponse};

/// A response with helpers for assertions.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Reads a transport response into memory.
    pub async fn from_http(response: HttpResponse) -> Self {
        let (parts, body) = response.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };
        Self::new(parts.status, parts.headers, body)
    }

    /// Creates a response from raw parts.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `x-request-id` the pipeline assigned.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header_str("x-request-id")
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// Deserializes the body as a response envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not an envelope.
    pub fn envelope(&self) -> Result<Envelope, TestError> {
        self.json()
    }

    // Assertion methods

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts a success envelope and returns its `data`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not a success envelope.
    pub fn assert_success_envelope(&self) -> Value {
        let envelope = self
            .envelope()
            .unwrap_or_else(|e| panic!("Expected an envelope: {e}"));
        assert!(envelope.success, "Expected success envelope, got {envelope:?}");
        assert!(envelope.error.is_none(), "Success envelope carries an error");
        envelope.data.unwrap_or(Value::Null)
    }

    /// Asserts an error envelope with the given message and returns its
    /// `details`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an error envelope with `message`.
    pub fn assert_error_envelope(&self, message: &str) -> Option<Value> {
        let envelope = self
            .envelope()
            .unwrap_or_else(|e| panic!("Expected an envelope: {e}"));
        assert!(!envelope.success, "Expected error envelope, got {envelope:?}");
        assert_eq!(envelope.error.as_deref(), Some(message));
        assert!(envelope.data.is_none(), "Error envelope carries data");
        envelope.details
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(actual, expected, "Header '{name}' mismatch");
        self
    }

    /// Asserts a JSON content type.
    ///
    /// # Panics
    ///
    /// Panics if the content type is not `application/json`.
    pub fn assert_json(&self) -> &Self {
        let actual = self.header_str(header::CONTENT_TYPE.as_str());
        assert_eq!(actual, Some("application/json"), "Expected a JSON response");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: StatusCode, body: &Value) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        TestResponse::new(status, headers, Bytes::from(body.to_string()))
    }

    #[test]
    fn test_success_envelope() {
        let res = response(
            StatusCode::OK,
            &json!({ "success": true, "data": { "id": 1 }, "timestamp": "t" }),
        );
        let data = res.assert_status(StatusCode::OK).assert_json().assert_success_envelope();
        assert_eq!(data, json!({ "id": 1 }));
    }

    #[test]
    fn test_error_envelope() {
        let res = response(
            StatusCode::UNAUTHORIZED,
            &json!({ "success": false, "error": "Invalid API key", "timestamp": "t" }),
        );
        assert!(res.assert_error_envelope("Invalid API key").is_none());
    }

    #[test]
    #[should_panic(expected = "Expected status")]
    fn test_assert_status_panics() {
        response(StatusCode::OK, &json!({})).assert_status(StatusCode::CREATED);
    }
}
