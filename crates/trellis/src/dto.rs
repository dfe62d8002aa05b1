//! Request and response bodies of the reference services.
//!
//! Each request type has a matching [`Schema`] used by the validation
//! middleware; handlers then read the validated body with
//! [`Context::validated_body_as`](trellis_middleware::Context::validated_body_as).

use serde::{Deserialize, Serialize};
use trellis_core::schema::Schema;

/// `POST /login` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Client channel (`web`, `extension`, ...).
    pub channel: String,
}

impl LoginRequest {
    /// Schema for [`LoginRequest`].
    #[must_use]
    pub fn schema() -> Schema {
        Schema::object([
            ("email", Schema::string().email()),
            ("password", Schema::string()),
            ("channel", Schema::string()),
        ])
    }
}

/// Successful login or OTP verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Authenticated user id.
    pub user: String,
    /// Bearer token for member endpoints.
    pub token: String,
    /// Token expiry, ISO-8601 UTC.
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

/// `POST /guest/request-otp` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentOtpRequest {
    /// Email to send the code to.
    pub email: String,
}

impl SentOtpRequest {
    /// Schema for [`SentOtpRequest`].
    #[must_use]
    pub fn schema() -> Schema {
        Schema::object([("email", Schema::string().email())])
    }
}

/// Acknowledgement of a sent code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpSent {
    /// Human-readable confirmation.
    pub message: String,
}

/// `POST /guest/verify-otp` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    /// Email the code was sent to.
    pub email: String,
    /// The code.
    pub verification: String,
}

impl VerifyOtpRequest {
    /// Schema for [`VerifyOtpRequest`].
    #[must_use]
    pub fn schema() -> Schema {
        Schema::object([
            ("email", Schema::string()),
            ("verification", Schema::string().min_length(1)),
        ])
    }
}

/// `POST /messages` and `POST /guest/messages` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation id.
    pub context_id: String,
    /// User message.
    pub message: String,
}

impl ChatRequest {
    /// Schema for [`ChatRequest`].
    #[must_use]
    pub fn schema() -> Schema {
        Schema::object([
            ("contextId", Schema::string()),
            ("message", Schema::string().min_length(1)),
        ])
    }
}

/// A link attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link title.
    pub title: String,
    /// Target URL.
    pub url: String,
}

/// One chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    /// Conversation id.
    pub context_id: String,
    /// Reply time, ISO-8601 UTC.
    pub date_time: String,
    /// The message the user sent.
    pub question: String,
    /// Reply text.
    pub reply_message: String,
    /// Related links.
    pub links: Vec<Link>,
}
