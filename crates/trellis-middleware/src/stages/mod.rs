//! Standard middleware stages.
//!
//! Every stage is stateless across requests: construction parameters are
//! fixed when the pipeline is built and all per-request data lives in the
//! [`Context`](crate::Context).
//!
//! ## Before Stages
//!
//! - [`dependency_injection`] - attach the shared service container
//! - [`date_header`] - stamp `x-date` on the response
//! - [`api_key`] - `x-api-key` gate per key category
//! - [`authentication`] - Bearer and Basic authentication
//! - [`presence`] - required headers, path and query parameters
//! - [`body_parser`] - JSON and Pub/Sub push bodies
//! - [`validation`] - schema validation of body or query
//!
//! ## After Stages
//!
//! - [`response_envelope`] - write the success envelope
//!
//! ## Error Stages
//!
//! - [`error_translator`] - log the error and write the error envelope

pub mod api_key;
pub mod authentication;
pub mod body_parser;
pub mod date_header;
pub mod dependency_injection;
pub mod error_translator;
pub mod presence;
pub mod response_envelope;
pub mod validation;

pub use api_key::{ApiKeyMiddleware, API_KEY_HEADER};
pub use authentication::{BasicAuthMiddleware, BearerAuthMiddleware, AUTHORIZATION_HEADER};
pub use body_parser::BodyParserMiddleware;
pub use date_header::{DateHeaderMiddleware, DATE_HEADER};
pub use dependency_injection::DependencyInjectionMiddleware;
pub use error_translator::ErrorTranslatorMiddleware;
pub use presence::{RequiredHeadersMiddleware, RequiredPathParamsMiddleware, RequiredQueryParamsMiddleware};
pub use response_envelope::ResponseEnvelopeMiddleware;
pub use validation::{BodyValidationMiddleware, SchemaValidationMiddleware};
