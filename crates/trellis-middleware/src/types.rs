//! Conversion between transport requests and the pipeline [`Context`].
//!
//! The pipeline itself never sees a transport type. A host (serverless
//! runtime, test harness, local server) hands [`Pipeline::process`] an
//! [`HttpRequest`] and gets an [`HttpResponse`] back.
//!
//! Path parameters come from the host's router, which inserts a
//! [`PathParams`] extension into the request before processing.
//!
//! [`Pipeline::process`]: crate::Pipeline::process

use crate::context::{Context, Request, REQUEST_ID_HEADER};
use bytes::Bytes;
use http::header::HeaderValue;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Inbound transport request.
pub type HttpRequest = http::Request<Full<Bytes>>;

/// Outbound transport response.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Path parameters extracted by the host router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub HashMap<String, String>);

impl PathParams {
    /// Creates an empty set of parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

/// Builds a [`Context`] from a transport request.
///
/// Duplicate query keys keep the last value.
pub async fn context_from_http(request: HttpRequest) -> Context {
    let (mut parts, body) = request.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };

    let params = parts
        .extensions
        .remove::<PathParams>()
        .map(|p| p.0)
        .unwrap_or_default();

    let query = parts.uri.query().map(parse_query).unwrap_or_default();

    let mut inbound = Request::new(parts.method, parts.uri.path());
    inbound.headers = parts.headers;
    inbound.params = params;
    inbound.query = query;
    inbound.body = body;

    Context::new(inbound)
}

/// Parses a query string into a flat object of strings.
///
/// Malformed query strings yield an empty object.
#[must_use]
pub fn parse_query(query: &str) -> Map<String, Value> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed query string");
            Map::new()
        }
    }
}

/// Builds the transport response from a finished [`Context`].
///
/// Copies the response headers and adds `x-request-id`. A context with no
/// written response becomes an empty 500.
#[must_use]
pub fn http_from_context(ctx: &Context) -> HttpResponse {
    let (status, body) = match ctx.response.written() {
        Some(written) => (written.status, written.body.clone()),
        None => (StatusCode::INTERNAL_SERVER_ERROR, Bytes::new()),
    };

    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = ctx.response.headers().clone();

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
