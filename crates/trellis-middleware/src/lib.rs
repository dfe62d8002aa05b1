//! Request pipeline for Trellis.
//!
//! This crate provides the pipeline engine: a per-request [`Context`], the
//! [`Middleware`] contract with optional `before` / `after` / `on_error`
//! hooks, a [`PipelineBuilder`] that fixes the middleware order once, and
//! the [`Pipeline`] executor that runs it.
//!
//! ## Lifecycle
//!
//! ```text
//! Transport request
//!        │
//!        ▼
//! ┌──────────────┐   error   ┌──────────────┐
//! │ before hooks │──────────►│              │
//! └──────┬───────┘           │              │
//!        ▼                   │  on_error    │
//! ┌──────────────┐   error   │  hooks, in   │
//! │   handler    │──────────►│  order until │
//! └──────┬───────┘           │  one writes  │
//!        ▼                   │              │
//! ┌──────────────┐   error   │              │
//! │ after hooks  │──────────►│              │
//! └──────┬───────┘           └──────┬───────┘
//!        ▼                          ▼
//!   one response written     one response written
//! ```
//!
//! ## Standard Middleware
//!
//! The [`stages`] module holds the reusable middlewares: dependency
//! injection, body parsing, schema validation, Bearer/Basic authentication,
//! the API key gate, presence validators, the error translator and the
//! response envelope.
//!
//! ## Example
//!
//! ```
//! use trellis_middleware::{Pipeline, Request, Context};
//! use trellis_middleware::stages::{
//!     BodyParserMiddleware, ErrorTranslatorMiddleware, ResponseEnvelopeMiddleware,
//! };
//! use http::{Method, StatusCode};
//!
//! # tokio_test::block_on(async {
//! let echo = Pipeline::builder()
//!     .with(ErrorTranslatorMiddleware::new())
//!     .with(BodyParserMiddleware::new())
//!     .with(ResponseEnvelopeMiddleware::new())
//!     .handle(|ctx| {
//!         Box::pin(async move {
//!             let body = ctx.parsed_body_as::<serde_json::Value>()?;
//!             ctx.response.set_response_body(body);
//!             Ok(())
//!         })
//!     });
//!
//! let mut ctx = Context::new(Request::new(Method::POST, "/echo").with_body("{oops"));
//! let report = echo.execute(&mut ctx).await;
//!
//! assert_eq!(report.status, StatusCode::BAD_REQUEST);
//! assert_eq!(report.handled_by, Some("error_translator"));
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod envelope;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use context::{Context, Request, Response, ResponseError, WrittenResponse};
pub use envelope::Envelope;
pub use middleware::{HookResult, HookSet, HookTable, Middleware};
pub use pipeline::{ExecutionReport, Phase, Pipeline, PipelineBuilder};
pub use trellis_core::BoxFuture;
pub use types::{HttpRequest, HttpResponse, PathParams};
