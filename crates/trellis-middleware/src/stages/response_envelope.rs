//! Response envelope middleware.
//!
//! Wraps whatever the handler staged in `locals.responseBody` in the success
//! envelope and writes it at the current status. Handlers that already wrote
//! a response are left alone.

use crate::context::Context;
use crate::envelope::Envelope;
use crate::middleware::{HookResult, HookSet, Middleware};
use serde_json::Value;
use trellis_core::{BoxFuture, PipelineError};

/// Writes `{ success: true, data, timestamp }`.
///
/// Register it last so every other `after` hook sees the staged payload
/// before it is serialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEnvelopeMiddleware;

impl ResponseEnvelopeMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for ResponseEnvelopeMiddleware {
    fn name(&self) -> &'static str {
        "response_envelope"
    }

    fn hooks(&self) -> HookSet {
        HookSet::AFTER
    }

    fn after<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            if ctx.response.is_sent() {
                return Ok(());
            }

            let data = ctx.response.response_body().cloned().unwrap_or(Value::Null);
            let status = ctx.response.status();
            ctx.response
                .send(status, &Envelope::success(data).to_value())
                .map_err(|e| PipelineError::internal_with_source("Failed to write envelope", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Request;
    use http::{Method, StatusCode};
    use serde_json::json;

    async fn run(ctx: &mut Context) -> Value {
        ResponseEnvelopeMiddleware::new().after(ctx).await.unwrap();
        serde_json::from_slice(&ctx.response.written().unwrap().body).unwrap()
    }

    #[tokio::test]
    async fn test_wraps_staged_body() {
        let mut ctx = Context::new(Request::new(Method::POST, "/login"));
        ctx.response.set_response_body(json!({ "token": "t-1" }));

        let body = run(&mut ctx).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], json!({ "token": "t-1" }));
        assert_eq!(ctx.response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_uses_explicit_status_and_null_data() {
        let mut ctx = Context::new(Request::new(Method::POST, "/items"));
        ctx.response.set_status(StatusCode::CREATED);

        let body = run(&mut ctx).await;
        assert_eq!(body["data"], Value::Null);
        assert_eq!(ctx.response.written().unwrap().status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_skips_when_already_sent() {
        let mut ctx = Context::new(Request::new(Method::GET, "/raw"));
        ctx.response.send(StatusCode::ACCEPTED, &json!("raw")).unwrap();

        let body = run(&mut ctx).await;
        assert_eq!(body, json!("raw"));
        assert_eq!(ctx.response.rejected_writes(), 0);
    }
}
