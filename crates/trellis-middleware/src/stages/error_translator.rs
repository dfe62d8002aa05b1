//! Error translation middleware.
//!
//! The canonical `on_error` hook. Every error is logged at error severity
//! with its message and source chain, then written as an error envelope:
//!
//! - exposed kinds (everything but internal) keep their status, message and
//!   details
//! - internal errors become a bare 500 `Internal Server Error`
//!
//! Register exactly one per pipeline.

use crate::context::Context;
use crate::envelope::Envelope;
use crate::middleware::{HookResult, HookSet, Middleware};
use http::StatusCode;
use trellis_core::{BoxFuture, PipelineError};

/// Logs errors and writes the error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslatorMiddleware;

impl ErrorTranslatorMiddleware {
    /// Registered name. The executor leaves logging to this middleware when
    /// it handles an error.
    pub const NAME: &'static str = "error_translator";

    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Builds the status and envelope an error is shown to callers as.
#[must_use]
pub fn translate(error: &PipelineError) -> (StatusCode, Envelope) {
    if error.is_exposed() {
        (
            error.status_code(),
            Envelope::error(error.message(), error.details()),
        )
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, Envelope::internal())
    }
}

impl Middleware for ErrorTranslatorMiddleware {
    fn name(&self) -> &'static str {
        ErrorTranslatorMiddleware::NAME
    }

    fn hooks(&self) -> HookSet {
        HookSet::ON_ERROR
    }

    fn on_error<'a>(
        &'a self,
        error: &'a PipelineError,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            tracing::error!(
                request_id = %ctx.request_id(),
                error.category = error.category().as_str(),
                error.message = error.message(),
                error.chain = ?error.chain(),
                "Error processing request"
            );

            let (status, envelope) = translate(error);
            if let Err(e) = ctx.response.send(status, &envelope.to_value()) {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    error = %e,
                    "Error response not written"
                );
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Request;
    use http::Method;
    use serde_json::{json, Value};
    use trellis_core::ValidationIssue;

    async fn written(error: PipelineError) -> (StatusCode, Value) {
        let mut ctx = Context::new(Request::new(Method::POST, "/"));
        ErrorTranslatorMiddleware::new()
            .on_error(&error, &mut ctx)
            .await
            .unwrap();
        let written = ctx.response.written().unwrap();
        (written.status, serde_json::from_slice(&written.body).unwrap())
    }

    #[tokio::test]
    async fn test_exposed_error() {
        let (status, body) = written(PipelineError::authentication("Invalid API key")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid API key");
        assert!(body.get("details").is_none());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_validation_details() {
        let error = PipelineError::validation_with_issues(
            "Validation error",
            vec![ValidationIssue::field("password", "invalid_type", "Required")],
        );
        let (status, body) = written(error).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["details"],
            json!([{ "path": ["password"], "code": "invalid_type", "message": "Required" }])
        );
    }

    #[tokio::test]
    async fn test_http_error_keeps_status() {
        let error = PipelineError::http(StatusCode::CONFLICT, "Already exists");
        let (status, body) = written(error).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Already exists");
    }

    #[tokio::test]
    async fn test_internal_error_is_hidden() {
        let error = PipelineError::internal("database password is hunter2");
        let (status, body) = written(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_already_sent_is_not_an_error() {
        let mut ctx = Context::new(Request::new(Method::POST, "/"));
        ctx.response.send(StatusCode::OK, &json!({})).unwrap();

        let error = PipelineError::internal("late");
        ErrorTranslatorMiddleware::new()
            .on_error(&error, &mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.response.written().unwrap().status, StatusCode::OK);
        assert_eq!(ctx.response.rejected_writes(), 1);
    }
}
