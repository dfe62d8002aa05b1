//! Body parsing middleware.
//!
//! Parses the raw body of POST, PUT and PATCH requests into
//! `request.parsed_body`. Two shapes are understood:
//!
//! - plain JSON
//! - a Pub/Sub push envelope, `{ "message": { "data": "<base64>" } }`, whose
//!   decoded data is parsed as JSON in place of the envelope
//!
//! An empty body leaves `parsed_body` unset. `validated_body` is never
//! touched.

use crate::context::Context;
use crate::middleware::{HookResult, HookSet, Middleware};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use trellis_core::{BoxFuture, PipelineError};

/// Message for a body that is not valid JSON.
pub const INVALID_JSON: &str = "Invalid JSON body";

/// Message for a Pub/Sub envelope whose data cannot be decoded.
pub const INVALID_PUBSUB: &str = "Invalid Pub/Sub message";

/// Parses JSON and Pub/Sub push bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyParserMiddleware;

impl BodyParserMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for BodyParserMiddleware {
    fn name(&self) -> &'static str {
        "body_parser"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            if !ctx.request.has_body_method() || is_blank(&ctx.request.body) {
                return Ok(());
            }

            let parsed: Value = serde_json::from_slice(&ctx.request.body)
                .map_err(|_| PipelineError::parse(INVALID_JSON))?;

            let parsed = match pubsub_data(&parsed) {
                Some(data) => decode_pubsub(data)?,
                None => parsed,
            };

            ctx.request.parsed_body = Some(parsed);
            Ok(())
        })
    }
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Returns the `message.data` field when `value` is a Pub/Sub envelope.
///
/// An absent or falsy `data` (`null`, `false`, `0`, `""`) means the body is
/// ordinary JSON.
fn pubsub_data(value: &Value) -> Option<&Value> {
    let data = value.get("message")?.get("data")?;
    let falsy = match data {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() < f64::EPSILON),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    };
    (!falsy).then_some(data)
}

fn decode_pubsub(data: &Value) -> Result<Value, PipelineError> {
    let encoded = data.as_str().ok_or_else(|| PipelineError::parse(INVALID_PUBSUB))?;
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| PipelineError::parse(INVALID_PUBSUB))?;
    serde_json::from_slice(&decoded).map_err(|_| PipelineError::parse(INVALID_PUBSUB))
}
