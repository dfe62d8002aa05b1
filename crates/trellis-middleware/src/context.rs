//! Per-request state threaded through the pipeline.
//!
//! A [`Context`] is created for every request and discarded once the
//! response is written. It carries:
//!
//! - [`Request`] - the inbound method, path, headers, params, query and body,
//!   plus the `parsed_body`/`validated_body` slots filled by middleware
//! - [`Response`] - the outbound sink with its single guarded [`Response::send`]
//! - the authenticated [`Principal`], set only by authentication middleware
//! - the shared service [`Container`], set by dependency injection
//! - `business_data`, free-form facts that do not belong in the response
//!
//! # Example
//!
//! ```
//! use trellis_middleware::context::{Context, Request};
//! use http::{Method, StatusCode};
//! use serde_json::json;
//!
//! let mut ctx = Context::new(Request::new(Method::POST, "/login"));
//! ctx.response.set_status(StatusCode::CREATED);
//! ctx.response.set_response_body(json!({ "token": "t-1" }));
//!
//! assert_eq!(ctx.response.response_body(), Some(&json!({ "token": "t-1" })));
//! assert!(!ctx.response.is_sent());
//! ```

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use trellis_core::di::Container;
use trellis_core::{PipelineError, PipelineResult, Principal};
use uuid::Uuid;

/// The header carrying the request ID in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Key in [`Response::locals`] where handlers stage the success payload.
pub const RESPONSE_BODY_LOCAL: &str = "responseBody";

/// Inbound request data.
///
/// Header lookups are case-insensitive. `parsed_body` is filled by body
/// parsing and `validated_body` by schema validation; both start empty.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Request path, without the query string.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Path parameters extracted by the router.
    pub params: HashMap<String, String>,
    /// Query parameters. Validation may replace values with coerced ones.
    pub query: Map<String, Value>,
    /// Raw request body.
    pub body: Bytes,
    /// Structured body, set by body parsing.
    pub parsed_body: Option<Value>,
    /// Schema-conformant body, set by validation.
    pub validated_body: Option<Value>,
}

impl Request {
    /// Creates a request with no headers, params, query or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            params: HashMap::new(),
            query: Map::new(),
            body: Bytes::new(),
            parsed_body: None,
            validated_body: None,
        }
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Adds a path parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Sets the raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns a path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns `true` if the method usually carries a body.
    #[must_use]
    pub fn has_body_method(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// A second write to the same [`Response`] was attempted.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ResponseError {
    /// A response has already been written for this request.
    #[error("response already sent with status {status}")]
    AlreadySent {
        /// Status of the response that was written first.
        status: StatusCode,
    },
}

/// The single response written for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenResponse {
    /// Status code.
    pub status: StatusCode,
    /// Serialized body (empty for bodyless responses).
    pub body: Bytes,
}

/// Outbound response sink.
///
/// Only one write is ever accepted. Later calls to [`send`](Self::send) are
/// rejected, counted and logged; they never replace the first response.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    locals: Map<String, Value>,
    written: Option<WrittenResponse>,
    rejected_writes: usize,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Creates an unsent response with status 200.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            locals: Map::new(),
            written: None,
            rejected_writes: 0,
        }
    }

    /// Returns the current status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code used by a later success write.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a response header, replacing any previous value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Returns the locals used to stage response data.
    #[must_use]
    pub fn locals(&self) -> &Map<String, Value> {
        &self.locals
    }

    /// Returns the locals mutably.
    pub fn locals_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.locals
    }

    /// Stages the success payload for the envelope middleware.
    pub fn set_response_body(&mut self, body: Value) {
        self.locals.insert(RESPONSE_BODY_LOCAL.to_string(), body);
    }

    /// Returns the staged success payload.
    #[must_use]
    pub fn response_body(&self) -> Option<&Value> {
        self.locals.get(RESPONSE_BODY_LOCAL)
    }

    /// Writes a JSON response.
    ///
    /// Sets `content-type: application/json` and records `status` as the
    /// response status.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::AlreadySent`] if a response was already
    /// written. The first response is kept.
    pub fn send(&mut self, status: StatusCode, body: &Value) -> Result<(), ResponseError> {
        self.check_unsent(status)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.commit(status, Bytes::from(body.to_string()));
        Ok(())
    }

    /// Writes a response with no body.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::AlreadySent`] if a response was already
    /// written.
    pub fn send_empty(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.check_unsent(status)?;
        self.commit(status, Bytes::new());
        Ok(())
    }

    fn check_unsent(&mut self, attempted: StatusCode) -> Result<(), ResponseError> {
        match &self.written {
            None => Ok(()),
            Some(first) => {
                self.rejected_writes += 1;
                tracing::warn!(
                    first_status = first.status.as_u16(),
                    attempted_status = attempted.as_u16(),
                    "Rejected second response write"
                );
                Err(ResponseError::AlreadySent {
                    status: first.status,
                })
            }
        }
    }

    fn commit(&mut self, status: StatusCode, body: Bytes) {
        self.status = status;
        self.written = Some(WrittenResponse { status, body });
    }

    /// Returns `true` once a response has been written.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.written.is_some()
    }

    /// Returns the written response, if any.
    #[must_use]
    pub fn written(&self) -> Option<&WrittenResponse> {
        self.written.as_ref()
    }

    /// Returns how many writes were rejected because one had already
    /// been accepted.
    #[must_use]
    pub fn rejected_writes(&self) -> usize {
        self.rejected_writes
    }
}

/// Context that flows through the pipeline for one request.
///
/// Contexts are never shared between requests. Middlewares are shared, so
/// any per-request state belongs here.
#[derive(Debug)]
pub struct Context {
    request_id: Uuid,
    started_at: Instant,

    /// Inbound request data.
    pub request: Request,

    /// Outbound response sink.
    pub response: Response,

    user: Option<Principal>,
    container: Option<Arc<Container>>,

    /// Auxiliary facts passed between middlewares and handlers.
    pub business_data: HashMap<String, Value>,
}

impl Context {
    /// Creates a context for `request`.
    ///
    /// The request ID is taken from a valid UUID in the `x-request-id`
    /// header, otherwise a new UUID v7 is generated.
    #[must_use]
    pub fn new(request: Request) -> Self {
        let request_id = request
            .header(REQUEST_ID_HEADER)
            .and_then(|value| Uuid::parse_str(value).ok())
            .unwrap_or_else(Uuid::now_v7);

        Self {
            request_id,
            started_at: Instant::now(),
            request,
            response: Response::new(),
            user: None,
            container: None,
            business_data: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the authenticated principal, if any.
    #[must_use]
    pub fn user(&self) -> Option<&Principal> {
        self.user.as_ref()
    }

    /// Attaches the authenticated principal.
    ///
    /// Only authentication middleware should call this.
    pub fn set_user(&mut self, principal: Principal) {
        self.user = Some(principal);
    }

    /// Returns the principal or an authentication error.
    pub fn require_user(&self) -> PipelineResult<&Principal> {
        self.user
            .as_ref()
            .ok_or_else(|| PipelineError::authentication("Authentication required"))
    }

    /// Returns the injected service container, if any.
    #[must_use]
    pub fn container(&self) -> Option<&Arc<Container>> {
        self.container.as_ref()
    }

    /// Attaches the shared service container.
    pub fn set_container(&mut self, container: Arc<Container>) {
        self.container = Some(container);
    }

    /// Resolves a service from the injected container.
    ///
    /// # Errors
    ///
    /// Returns an internal error if no container was injected or the
    /// service is not registered.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> PipelineResult<Arc<T>> {
        let container = self
            .container
            .as_ref()
            .ok_or_else(|| PipelineError::internal("no service container injected"))?;
        Ok(container.resolve_required::<T>()?)
    }

    /// Deserializes the parsed body.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the body is absent and an internal error if
    /// it does not match `T`.
    pub fn parsed_body_as<T: DeserializeOwned>(&self) -> PipelineResult<T> {
        let body = self
            .request
            .parsed_body
            .clone()
            .ok_or_else(|| PipelineError::parse("Request body is required"))?;
        Ok(serde_json::from_value(body)?)
    }

    /// Deserializes the validated body.
    ///
    /// # Errors
    ///
    /// Returns an internal error if no validation ran or the body does not
    /// match `T`.
    pub fn validated_body_as<T: DeserializeOwned>(&self) -> PipelineResult<T> {
        let body = self
            .request
            .validated_body
            .clone()
            .ok_or_else(|| PipelineError::internal("request body has not been validated"))?;
        Ok(serde_json::from_value(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Login {
        email: String,
    }

    #[test]
    fn test_default_response_state() {
        let ctx = Context::new(Request::new(Method::GET, "/"));
        assert_eq!(ctx.response.status(), StatusCode::OK);
        assert!(!ctx.response.is_sent());
        assert!(ctx.user().is_none());
        assert!(ctx.container().is_none());
        assert!(ctx.business_data.is_empty());
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = Request::new(Method::GET, "/").with_header("X-Api-Key", "k");
        assert_eq!(request.header("x-api-key"), Some("k"));
        assert_eq!(request.header("X-API-KEY"), Some("k"));
    }

    #[test]
    fn test_request_id_from_header() {
        let id = Uuid::now_v7();
        let ctx = Context::new(
            Request::new(Method::GET, "/").with_header(REQUEST_ID_HEADER, &id.to_string()),
        );
        assert_eq!(ctx.request_id(), id);
    }

    #[test]
    fn test_invalid_request_id_is_replaced() {
        let ctx = Context::new(Request::new(Method::GET, "/").with_header(REQUEST_ID_HEADER, "abc"));
        assert_eq!(ctx.request_id().get_version_num(), 7);
    }

    #[test]
    fn test_second_send_is_rejected() {
        let mut response = Response::new();
        response.send(StatusCode::CREATED, &json!({ "ok": true })).unwrap();

        let err = response
            .send(StatusCode::INTERNAL_SERVER_ERROR, &json!({ "ok": false }))
            .unwrap_err();
        assert_eq!(
            err,
            ResponseError::AlreadySent {
                status: StatusCode::CREATED
            }
        );
        assert!(response.send_empty(StatusCode::OK).is_err());

        let written = response.written().unwrap();
        assert_eq!(written.status, StatusCode::CREATED);
        assert_eq!(written.body, Bytes::from(r#"{"ok":true}"#));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.rejected_writes(), 2);
    }

    #[test]
    fn test_send_sets_json_content_type() {
        let mut response = Response::new();
        response.send(StatusCode::OK, &json!({})).unwrap();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_send_empty() {
        let mut response = Response::new();
        response.send_empty(StatusCode::NO_CONTENT).unwrap();
        let written = response.written().unwrap();
        assert_eq!(written.status, StatusCode::NO_CONTENT);
        assert!(written.body.is_empty());
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_typed_bodies() {
        let mut ctx = Context::new(Request::new(Method::POST, "/login"));
        assert!(ctx.parsed_body_as::<Login>().is_err());
        assert!(!ctx.validated_body_as::<Login>().unwrap_err().is_exposed());

        ctx.request.validated_body = Some(json!({ "email": "a@b.com" }));
        let login: Login = ctx.validated_body_as().unwrap();
        assert_eq!(login.email, "a@b.com");
    }

    #[test]
    fn test_resolve_without_container() {
        let ctx = Context::new(Request::new(Method::GET, "/"));
        let err = ctx.resolve::<String>().unwrap_err();
        assert!(!err.is_exposed());
    }

    #[test]
    fn test_resolve_from_container() {
        let mut ctx = Context::new(Request::new(Method::GET, "/"));
        ctx.set_container(
            Container::builder()
                .register(Arc::new("svc".to_string()))
                .build(),
        );
        assert_eq!(ctx.resolve::<String>().unwrap().as_str(), "svc");
    }

    #[test]
    fn test_require_user() {
        let mut ctx = Context::new(Request::new(Method::GET, "/"));
        assert_eq!(ctx.require_user().unwrap_err().status_code(), StatusCode::UNAUTHORIZED);

        ctx.set_user(Principal::new("u-1", trellis_core::AuthMethod::Bearer));
        assert_eq!(ctx.require_user().unwrap().user_id, "u-1");
    }

    #[test]
    fn test_body_methods() {
        assert!(Request::new(Method::PATCH, "/").has_body_method());
        assert!(!Request::new(Method::GET, "/").has_body_method());
        assert!(!Request::new(Method::DELETE, "/").has_body_method());
    }
}
