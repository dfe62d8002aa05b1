//! Schema validation middleware.
//!
//! Runs a [`SchemaValidator`] against the request and stores the conformant
//! value. Nothing on the request is modified when validation fails.
//!
//! | Middleware | GET | other methods |
//! |------------|-----|---------------|
//! | [`SchemaValidationMiddleware`] | `query`, replaced by the result | `parsed_body` into `validated_body` |
//! | [`BodyValidationMiddleware`] | `parsed_body` into `validated_body` | same |

use crate::context::Context;
use crate::middleware::{HookResult, HookSet, Middleware};
use http::Method;
use serde_json::Value;
use std::sync::Arc;
use trellis_core::schema::SchemaValidator;
use trellis_core::{BoxFuture, PipelineError, ValidationIssue};

/// Message of every validation failure raised here.
pub const VALIDATION_ERROR: &str = "Validation error";

/// Validates the query for GET requests and the body otherwise.
#[derive(Clone)]
pub struct SchemaValidationMiddleware {
    schema: Arc<dyn SchemaValidator>,
}

impl SchemaValidationMiddleware {
    /// Creates the middleware with a schema.
    #[must_use]
    pub fn new(schema: impl SchemaValidator) -> Self {
        Self::shared(Arc::new(schema))
    }

    /// Creates the middleware with a schema shared with other middlewares.
    #[must_use]
    pub fn shared(schema: Arc<dyn SchemaValidator>) -> Self {
        Self { schema }
    }
}

impl std::fmt::Debug for SchemaValidationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidationMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for SchemaValidationMiddleware {
    fn name(&self) -> &'static str {
        "schema_validation"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            if ctx.request.method == Method::GET {
                validate_query(self.schema.as_ref(), ctx).await
            } else {
                validate_body(self.schema.as_ref(), ctx).await
            }
        })
    }
}

/// Validates `parsed_body` regardless of method.
#[derive(Clone)]
pub struct BodyValidationMiddleware {
    schema: Arc<dyn SchemaValidator>,
}

impl BodyValidationMiddleware {
    /// Creates the middleware with a schema.
    #[must_use]
    pub fn new(schema: impl SchemaValidator) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }
}

impl std::fmt::Debug for BodyValidationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyValidationMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for BodyValidationMiddleware {
    fn name(&self) -> &'static str {
        "body_validation"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move { validate_body(self.schema.as_ref(), ctx).await })
    }
}

async fn validate_body(schema: &dyn SchemaValidator, ctx: &mut Context) -> HookResult {
    let input = ctx.request.parsed_body.clone().unwrap_or(Value::Null);
    let output = schema.parse(&input).await.map_err(rejected)?;
    ctx.request.validated_body = Some(output);
    Ok(())
}

async fn validate_query(schema: &dyn SchemaValidator, ctx: &mut Context) -> HookResult {
    let input = Value::Object(ctx.request.query.clone());
    match schema.parse(&input).await.map_err(rejected)? {
        Value::Object(query) => {
            ctx.request.query = query;
            Ok(())
        }
        other => Err(PipelineError::internal(format!(
            "query schema produced a non-object value: {other}"
        ))),
    }
}

fn rejected(issues: Vec<ValidationIssue>) -> PipelineError {
    tracing::debug!(issue_count = issues.len(), "Request failed validation");
    PipelineError::validation_with_issues(VALIDATION_ERROR, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Request;
    use serde_json::json;
    use trellis_core::schema::Schema;

    fn login_schema() -> Schema {
        Schema::object([
            ("email", Schema::string().email()),
            ("password", Schema::string()),
            ("channel", Schema::string()),
        ])
    }

    fn post(body: Value) -> Context {
        let mut ctx = Context::new(Request::new(Method::POST, "/login"));
        ctx.request.parsed_body = Some(body);
        ctx
    }

    #[tokio::test]
    async fn test_valid_body_sets_validated_body() {
        let mut ctx = post(json!({
            "email": "a@b.com", "password": "x", "channel": "web", "extra": true
        }));

        SchemaValidationMiddleware::new(login_schema())
            .before(&mut ctx)
            .await
            .unwrap();

        assert_eq!(
            ctx.request.validated_body,
            Some(json!({ "email": "a@b.com", "password": "x", "channel": "web" }))
        );
    }

    #[tokio::test]
    async fn test_invalid_body_reports_every_issue() {
        let mut ctx = post(json!({ "email": "nope", "channel": "web" }));

        let err = SchemaValidationMiddleware::new(login_schema())
            .before(&mut ctx)
            .await
            .unwrap_err();

        assert_eq!(err.message(), VALIDATION_ERROR);
        let paths: Vec<String> = err.issues().iter().map(ValidationIssue::dotted_path).collect();
        assert_eq!(paths, vec!["email", "password"]);
        assert_eq!(err.issues()[1].code, "invalid_type");
        assert!(ctx.request.validated_body.is_none());
    }

    #[tokio::test]
    async fn test_missing_body_fails() {
        let mut ctx = Context::new(Request::new(Method::POST, "/login"));
        let err = BodyValidationMiddleware::new(login_schema())
            .before(&mut ctx)
            .await
            .unwrap_err();
        assert!(!err.issues().is_empty());
    }

    #[tokio::test]
    async fn test_get_validates_query() {
        let schema = Schema::object([
            ("city", Schema::string()),
            ("days", Schema::integer().coerce().optional()),
        ]);
        let mut ctx = Context::new(
            Request::new(Method::GET, "/weather")
                .with_query("city", "Porto")
                .with_query("days", "3"),
        );

        SchemaValidationMiddleware::new(schema)
            .before(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.request.query["days"], json!(3));
        assert!(ctx.request.validated_body.is_none());
    }

    #[tokio::test]
    async fn test_invalid_query_is_left_untouched() {
        let schema = Schema::object([("city", Schema::string())]);
        let mut ctx = Context::new(Request::new(Method::GET, "/weather").with_query("town", "Porto"));

        let err = SchemaValidationMiddleware::new(schema)
            .before(&mut ctx)
            .await
            .unwrap_err();

        assert_eq!(err.issues()[0].dotted_path(), "city");
        assert_eq!(ctx.request.query["town"], json!("Porto"));
    }

    #[tokio::test]
    async fn test_body_validation_ignores_method() {
        let mut ctx = Context::new(Request::new(Method::GET, "/"));
        ctx.request.parsed_body = Some(json!({ "n": 1 }));

        BodyValidationMiddleware::new(Schema::object([("n", Schema::number())]))
            .before(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.request.validated_body, Some(json!({ "n": 1 })));
    }
}
