//! Error taxonomy for Trellis pipelines.
//!
//! Every `before`, `after` and terminal handler failure is a [`PipelineError`].
//! The taxonomy is closed: a recognized kind carries a status code and a
//! caller-visible message, while [`PipelineError::Internal`] is the bucket for
//! anything unclassified and never exposes its message.
//!
//! | Kind | Status | Exposed |
//! |---|---|---|
//! | `Parse` | 400 | yes |
//! | `Validation` | 400 | yes, with issues as `details` |
//! | `Authentication` | 401 | yes |
//! | `Authorization` | 403 | yes |
//! | `NotFound` | 404 | yes |
//! | `Upstream` | 502 | yes |
//! | `Http` | explicit | yes |
//! | `Internal` | 500 | no |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type alias using [`PipelineError`].
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed request body.
    Parse,
    /// Schema or field-level validation failure.
    Validation,
    /// Missing or invalid credentials.
    Authentication,
    /// Valid identity, insufficient rights.
    Authorization,
    /// Referenced entity absent.
    NotFound,
    /// A collaborator service failed.
    Upstream,
    /// An explicitly chosen HTTP status.
    Http,
    /// Anything unclassified.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this category.
    #[must_use]
    pub const fn default_status_code(self) -> StatusCode {
        match self {
            Self::Parse | Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Upstream => StatusCode::BAD_GATEWAY,
            Self::Http | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the snake_case name used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::NotFound => "not_found",
            Self::Upstream => "upstream",
            Self::Http => "http",
            Self::Internal => "internal",
        }
    }
}

/// The error type flowing through every pipeline phase.
///
/// The `Display` implementation yields the bare message, which is exactly
/// what the error envelope shows for exposed kinds.
///
/// # Example
///
/// ```
/// use trellis_core::{PipelineError, ErrorCategory};
///
/// let err = PipelineError::authentication("Invalid or expired token");
/// assert_eq!(err.category(), ErrorCategory::Authentication);
/// assert_eq!(err.status_code().as_u16(), 401);
/// assert_eq!(err.to_string(), "Invalid or expired token");
/// ```
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The request body could not be parsed.
    #[error("{message}")]
    Parse {
        /// Human-readable error message.
        message: String,
    },

    /// The request did not conform to a schema or a required-field rule.
    #[error("{message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Field-level issues, possibly empty.
        issues: Vec<ValidationIssue>,
    },

    /// Credentials were missing, malformed or rejected.
    #[error("{message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The caller is known but not allowed to perform the operation.
    #[error("{message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
        /// Optional resource descriptor surfaced as `details`.
        resource: Option<String>,
    },

    /// A downstream collaborator failed.
    #[error("{message}")]
    Upstream {
        /// Human-readable error message.
        message: String,
        /// Name of the failing service.
        service: Option<String>,
        /// Underlying failure (logged, never exposed).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// An error carrying an explicit HTTP status and optional details.
    #[error("{message}")]
    Http {
        /// Status to respond with.
        status: StatusCode,
        /// Human-readable error message.
        message: String,
        /// Structured details surfaced to the caller.
        details: Option<Value>,
    },

    /// Anything unclassified. The message is logged but never exposed.
    #[error("{message}")]
    Internal {
        /// Diagnostic message (not exposed to callers).
        message: String,
        /// Underlying failure.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl PipelineError {
    /// Creates a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a validation error without field issues.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    /// Creates a validation error carrying field-level issues.
    #[must_use]
    pub fn validation_with_issues(message: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self::Validation {
            message: message.into(),
            issues,
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource: None,
        }
    }

    /// Creates a not found error naming the missing resource.
    #[must_use]
    pub fn not_found_resource(resource_type: &str, resource_id: &str) -> Self {
        Self::NotFound {
            message: format!("{resource_type} with ID '{resource_id}' not found"),
            resource: Some(format!("{resource_type}/{resource_id}")),
        }
    }

    /// Creates an upstream error for a named service.
    #[must_use]
    pub fn upstream(message: impl Into<String>, service: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            service: Some(service.into()),
            source: None,
        }
    }

    /// Creates an upstream error wrapping the collaborator's failure.
    pub fn upstream_with_source(
        message: impl Into<String>,
        service: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Upstream {
            message: message.into(),
            service: Some(service.into()),
            source: Some(source.into()),
        }
    }

    /// Creates an error with an explicit HTTP status.
    #[must_use]
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an error with an explicit HTTP status and details.
    #[must_use]
    pub fn http_with_details(status: StatusCode, message: impl Into<String>, details: Value) -> Self {
        Self::Http {
            status,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse { .. } => ErrorCategory::Parse,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::Http { .. } => ErrorCategory::Http,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            other => other.category().default_status_code(),
        }
    }

    /// Returns `true` when the message and details may be shown to callers.
    ///
    /// Only [`PipelineError::Internal`] is hidden.
    #[must_use]
    pub const fn is_exposed(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    /// Returns the message of this error.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Parse { message }
            | Self::Validation { message, .. }
            | Self::Authentication { message }
            | Self::Authorization { message }
            | Self::NotFound { message, .. }
            | Self::Upstream { message, .. }
            | Self::Http { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    /// Returns the field-level issues of a validation error.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Validation { issues, .. } => issues,
            _ => &[],
        }
    }

    /// Returns caller-visible structured details, if any.
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Validation { issues, .. } if !issues.is_empty() => {
                serde_json::to_value(issues).ok()
            }
            Self::NotFound {
                resource: Some(resource),
                ..
            } => Some(serde_json::json!({ "resource": resource })),
            Self::Upstream {
                service: Some(service),
                ..
            } => Some(serde_json::json!({ "service": service })),
            Self::Http { details, .. } => details.clone(),
            _ => None,
        }
    }

    /// Returns the messages of this error and every source beneath it.
    ///
    /// Used for logging; this is the closest analogue to a stack trace.
    #[must_use]
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal_with_source("JSON serialization failed", err)
    }
}

/// One element of a validation issue path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(idx: usize) -> Self {
        Self::Index(idx)
    }
}

/// A single field-level validation failure.
///
/// Serializes as `{"path": [...], "code": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Location of the offending value; empty for the root.
    pub path: Vec<PathSegment>,
    /// Machine-readable issue code (`invalid_type`, `too_small`, ...).
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationIssue {
    /// Creates an issue at the given path.
    #[must_use]
    pub fn new(path: Vec<PathSegment>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an issue for a single top-level field.
    #[must_use]
    pub fn field(name: &str, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![PathSegment::from(name)], code, message)
    }

    /// Returns the path joined with dots (`items.0.name`).
    #[must_use]
    pub fn dotted_path(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} ({})", self.message, self.code)
        } else {
            write!(f, "{}: {} ({})", self.dotted_path(), self.message, self.code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_category() {
        assert_eq!(PipelineError::parse("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(PipelineError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(PipelineError::authentication("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(PipelineError::authorization("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(PipelineError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(PipelineError::upstream("x", "chat").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            PipelineError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_http_error_uses_explicit_status() {
        let err = PipelineError::http(StatusCode::CONFLICT, "Already exists");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.category(), ErrorCategory::Http);
        assert!(err.is_exposed());
    }

    #[test]
    fn test_internal_is_not_exposed() {
        let err = PipelineError::internal("database password is hunter2");
        assert!(!err.is_exposed());
        assert!(PipelineError::parse("bad").is_exposed());
    }

    #[test]
    fn test_validation_details_serialize_issues() {
        let err = PipelineError::validation_with_issues(
            "Validation error",
            vec![ValidationIssue::field("password", "invalid_type", "Required")],
        );

        let details = err.details().unwrap();
        assert_eq!(details[0]["path"], serde_json::json!(["password"]));
        assert_eq!(details[0]["code"], "invalid_type");
        assert_eq!(details[0]["message"], "Required");
    }

    #[test]
    fn test_validation_without_issues_has_no_details() {
        assert!(PipelineError::validation("Missing required header: x-date")
            .details()
            .is_none());
    }

    #[test]
    fn test_not_found_resource_details() {
        let err = PipelineError::not_found_resource("Weather", "w-1");
        assert_eq!(err.to_string(), "Weather with ID 'w-1' not found");
        assert_eq!(err.details().unwrap()["resource"], "Weather/w-1");
    }

    #[test]
    fn test_anyhow_becomes_internal_with_chain() {
        let source = anyhow::anyhow!("connection reset").context("loading profile");
        let err = PipelineError::from(source);
        assert_eq!(err.category(), ErrorCategory::Internal);

        let wrapped = PipelineError::internal_with_source("handler failed", anyhow::anyhow!("boom"));
        let chain = wrapped.chain();
        assert_eq!(chain[0], "handler failed");
        assert!(chain.iter().any(|m| m == "boom"));
    }

    #[test]
    fn test_path_segments_serialize_untagged() {
        let issue = ValidationIssue::new(
            vec![PathSegment::from("items"), PathSegment::from(2), PathSegment::from("name")],
            "too_small",
            "String must contain at least 1 character(s)",
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["path"], serde_json::json!(["items", 2, "name"]));
        assert_eq!(issue.dotted_path(), "items.2.name");
    }
}
