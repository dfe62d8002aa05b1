//! Pipeline builder and executor.
//!
//! A [`Pipeline`] is an immutable, ordered list of middlewares plus one
//! terminal handler. It is built once at startup and then serves any number
//! of concurrent requests.
//!
//! ## Phases
//!
//! ```text
//! Before ──► Handling ──► After ──► Done
//!    │           │          │
//!    └───────────┴──────────┴──► Error ──► Done
//! ```
//!
//! 1. **Before** - every `before` hook, in registration order. The first
//!    failure skips the remaining hooks and the handler.
//! 2. **Handling** - the terminal handler.
//! 3. **After** - every `after` hook, in registration order (not reversed).
//! 4. **Error** - `on_error` hooks in registration order, stopping at the
//!    first one that writes a response. If none does, a generic 500 envelope
//!    is written.
//! 5. **Done** - exactly one response has been written.
//!
//! A successful run in which nothing wrote a response ends with an empty
//! body at the current status.
//!
//! # Example
//!
//! ```
//! use trellis_middleware::{Context, Pipeline, Request};
//! use trellis_middleware::stages::{ErrorTranslatorMiddleware, ResponseEnvelopeMiddleware};
//! use http::{Method, StatusCode};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::builder()
//!     .with(ErrorTranslatorMiddleware::new())
//!     .with(ResponseEnvelopeMiddleware::new())
//!     .handle(|ctx| {
//!         Box::pin(async move {
//!             ctx.response.set_response_body(json!({ "hello": "world" }));
//!             Ok(())
//!         })
//!     });
//!
//! let mut ctx = Context::new(Request::new(Method::GET, "/hello"));
//! let report = pipeline.execute(&mut ctx).await;
//!
//! assert!(report.is_success());
//! assert_eq!(report.status, StatusCode::OK);
//! # });
//! ```

use crate::context::Context;
use crate::envelope::Envelope;
use crate::middleware::{HookResult, HookSet, HookTable, Middleware};
use crate::stages::ErrorTranslatorMiddleware;
use crate::types::{self, HttpRequest, HttpResponse};
use http::StatusCode;
use std::fmt;
use std::sync::Arc;
use trellis_core::{BoxFuture, PipelineError};

/// A type-erased middleware shared between pipelines.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The terminal handler of a pipeline.
pub type Handler = Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HookResult> + Send + Sync>;

/// Execution phase of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Running `before` hooks.
    Before,
    /// Running the terminal handler.
    Handling,
    /// Running `after` hooks.
    After,
    /// Running `on_error` hooks.
    Error,
    /// Finished.
    Done,
}

impl Phase {
    /// Returns the phase name used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Handling => "handling",
            Self::After => "after",
            Self::Error => "error",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened during one [`Pipeline::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// The phase that failed, if any.
    pub failed_phase: Option<Phase>,
    /// The middleware whose hook failed. `None` when the handler failed.
    pub failed_middleware: Option<&'static str>,
    /// The middleware whose `on_error` hook wrote the response.
    pub handled_by: Option<&'static str>,
    /// Whether the default 500 fallback was written.
    pub fallback: bool,
    /// Final response status.
    pub status: StatusCode,
}

impl ExecutionReport {
    /// Returns `true` if no phase failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_phase.is_none()
    }
}

struct Failure {
    phase: Phase,
    middleware: Option<&'static str>,
    error: PipelineError,
}

/// Builder for constructing a [`Pipeline`].
///
/// Cloning a builder is how a shared prefix is branched: each clone appends
/// independently and the middlewares themselves are shared by `Arc`.
///
/// ```
/// use trellis_middleware::Pipeline;
/// use trellis_middleware::stages::{BodyParserMiddleware, ErrorTranslatorMiddleware};
///
/// let prefix = Pipeline::builder()
///     .with(ErrorTranslatorMiddleware::new())
///     .with(BodyParserMiddleware::new());
///
/// let a = prefix.clone().handle(|_| Box::pin(async { Ok(()) }));
/// let b = prefix.handle(|_| Box::pin(async { Ok(()) }));
///
/// assert_eq!(a.middleware_names(), b.middleware_names());
/// ```
#[derive(Clone, Default)]
pub struct PipelineBuilder {
    middlewares: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware.
    ///
    /// A middleware that declares no hooks does nothing; it is skipped and
    /// a warning is logged.
    #[must_use]
    pub fn with<M: Middleware>(self, middleware: M) -> Self {
        self.with_shared(Arc::new(middleware))
    }

    /// Appends a middleware that is already shared.
    #[must_use]
    pub fn with_shared(mut self, middleware: BoxedMiddleware) -> Self {
        if middleware.hooks().is_empty() {
            tracing::warn!(
                middleware = middleware.name(),
                "Skipping middleware that declares no hooks"
            );
            return self;
        }
        self.middlewares.push(middleware);
        self
    }

    /// Appends a closure-based middleware.
    #[must_use]
    pub fn with_hooks(self, table: HookTable) -> Self {
        self.with(table)
    }

    /// Returns the number of registered middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns `true` if no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Finalizes the chain with its terminal handler.
    ///
    /// Consumes the builder; clone it first to reuse it as a prefix.
    #[must_use]
    pub fn handle<F>(self, handler: F) -> Pipeline
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HookResult> + Send + Sync + 'static,
    {
        Pipeline {
            middlewares: self.middlewares.into(),
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.middlewares.iter().map(|m| m.name()).collect();
        f.debug_struct("PipelineBuilder")
            .field("middlewares", &names)
            .finish()
    }
}

/// An immutable middleware chain with its terminal handler.
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Arc<[BoxedMiddleware]>,
    handler: Handler,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Returns the names of all middlewares in registration order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns `true` if the pipeline has no middlewares.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs the pipeline against `ctx`.
    ///
    /// On return exactly one response has been written to `ctx.response`.
    pub async fn execute(&self, ctx: &mut Context) -> ExecutionReport {
        let mut report = ExecutionReport {
            failed_phase: None,
            failed_middleware: None,
            handled_by: None,
            fallback: false,
            status: StatusCode::OK,
        };

        match self.run(ctx).await {
            Ok(()) => {
                if !ctx.response.is_sent() {
                    let status = ctx.response.status();
                    if ctx.response.send_empty(status).is_ok() {
                        tracing::debug!(
                            request_id = %ctx.request_id(),
                            "No response written, sent empty body"
                        );
                    }
                }
            }
            Err(failure) => {
                report.failed_phase = Some(failure.phase);
                report.failed_middleware = failure.middleware;
                self.recover(&failure, ctx, &mut report).await;
            }
        }

        report.status = ctx.response.status();

        tracing::info!(
            request_id = %ctx.request_id(),
            http.method = %ctx.request.method,
            http.path = %ctx.request.path,
            http.status_code = report.status.as_u16(),
            duration_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Request completed"
        );

        report
    }

    /// Runs the pipeline for a transport request and returns the response.
    ///
    /// The response carries the request ID in `x-request-id`.
    pub async fn process(&self, request: HttpRequest) -> HttpResponse {
        let mut ctx = types::context_from_http(request).await;
        self.execute(&mut ctx).await;
        types::http_from_context(&ctx)
    }

    async fn run(&self, ctx: &mut Context) -> Result<(), Failure> {
        for middleware in self.declaring(HookSet::BEFORE) {
            trace_hook(ctx, middleware.name(), Phase::Before);
            middleware.before(ctx).await.map_err(|error| Failure {
                phase: Phase::Before,
                middleware: Some(middleware.name()),
                error,
            })?;
        }

        tracing::debug!(request_id = %ctx.request_id(), phase = %Phase::Handling, "Invoking handler");
        (self.handler)(ctx).await.map_err(|error| Failure {
            phase: Phase::Handling,
            middleware: None,
            error,
        })?;

        for middleware in self.declaring(HookSet::AFTER) {
            trace_hook(ctx, middleware.name(), Phase::After);
            middleware.after(ctx).await.map_err(|error| Failure {
                phase: Phase::After,
                middleware: Some(middleware.name()),
                error,
            })?;
        }

        Ok(())
    }

    async fn recover(&self, failure: &Failure, ctx: &mut Context, report: &mut ExecutionReport) {
        tracing::debug!(
            request_id = %ctx.request_id(),
            phase = %failure.phase,
            error = %failure.error,
            "Entering error phase"
        );

        let sent_before = ctx.response.is_sent();
        let rejected_before = ctx.response.rejected_writes();

        for middleware in self.declaring(HookSet::ON_ERROR) {
            trace_hook(ctx, middleware.name(), Phase::Error);
            if let Err(hook_error) = middleware.on_error(&failure.error, ctx).await {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    middleware = middleware.name(),
                    error = %hook_error,
                    "Error hook failed"
                );
            }

            let wrote = (!sent_before && ctx.response.is_sent())
                || ctx.response.rejected_writes() > rejected_before;
            if wrote {
                report.handled_by = Some(middleware.name());
                if middleware.name() != ErrorTranslatorMiddleware::NAME {
                    log_failure(ctx, failure, "Request failed");
                }
                return;
            }
        }

        if ctx.response.is_sent() {
            log_failure(ctx, failure, "Request failed after its response was written");
            return;
        }

        log_failure(ctx, failure, "No error hook wrote a response, sending fallback");
        if ctx
            .response
            .send(StatusCode::INTERNAL_SERVER_ERROR, &Envelope::internal().to_value())
            .is_ok()
        {
            report.fallback = true;
        }
    }

    fn declaring(&self, hook: HookSet) -> impl Iterator<Item = &BoxedMiddleware> {
        self.middlewares
            .iter()
            .filter(move |middleware| middleware.hooks().contains(hook))
    }
}

fn log_failure(ctx: &Context, failure: &Failure, message: &str) {
    tracing::error!(
        request_id = %ctx.request_id(),
        phase = %failure.phase,
        middleware = failure.middleware.unwrap_or("handler"),
        error = %failure.error,
        error.chain = ?failure.error.chain(),
        "{}",
        message
    );
}

fn trace_hook(ctx: &Context, middleware: &'static str, phase: Phase) {
    tracing::debug!(
        request_id = %ctx.request_id(),
        middleware,
        phase = %phase,
        "Running hook"
    );
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middlewares", &self.middleware_names())
            .finish_non_exhaustive()
    }
}
