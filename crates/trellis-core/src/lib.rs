//! # Trellis Core
//!
//! Core types shared by every Trellis crate.
//!
//! This crate has no knowledge of the pipeline itself. It provides:
//!
//! - [`PipelineError`] - the error taxonomy every hook and handler speaks
//! - [`ValidationIssue`] - field-level validation detail (`path`, `code`, `message`)
//! - [`Principal`] / [`TokenPayload`] - the authenticated identity and the raw verified token claims
//! - [`di::Container`] - the process-wide service registry injected into each request
//! - [`schema`] - the schema validation port and a built-in JSON schema
//! - [`ports`] - collaborator interfaces (token and credential verification)

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod di;
mod error;
pub mod ports;
mod principal;
pub mod schema;

use std::future::Future;
use std::pin::Pin;

pub use error::{ErrorCategory, PathSegment, PipelineError, PipelineResult, ValidationIssue};
pub use principal::{AuthMethod, Principal, TokenPayload};

/// A boxed, `Send` future borrowing for `'a`.
///
/// Every asynchronous port and hook in Trellis returns this type so that
/// implementations can be stored behind `dyn` trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
