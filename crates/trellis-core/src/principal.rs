//! Authenticated principals and verified token payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a principal proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// `Authorization: Basic <credentials>`.
    Basic,
    /// `x-api-key` header.
    ApiKey,
}

/// Claims returned by a token verifier.
///
/// `user_id` accepts either `userId` or `sub` on the wire. Claims the struct
/// does not name are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    /// Subject of the token.
    #[serde(alias = "sub")]
    pub user_id: String,
    /// Email address of the subject.
    pub email: String,
    /// Optional role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Any remaining claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenPayload {
    /// Creates a payload with no role and no extra claims.
    #[must_use]
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            role: None,
            extra: Map::new(),
        }
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// The authenticated identity attached to a request context.
///
/// Only authentication middleware sets this on the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user identifier.
    pub user_id: String,
    /// Email address, when known.
    pub email: Option<String>,
    /// Roles granted to the principal.
    pub roles: Vec<String>,
    /// How the identity was established.
    pub auth_method: AuthMethod,
    /// Claims not mapped to a dedicated field.
    pub claims: Map<String, Value>,
}

impl Principal {
    /// Creates a principal with no roles or claims.
    #[must_use]
    pub fn new(user_id: impl Into<String>, auth_method: AuthMethod) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            roles: Vec::new(),
            auth_method,
            claims: Map::new(),
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Returns `true` if the principal holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Identifier suitable for log fields. Never contains secrets.
    #[must_use]
    pub fn log_id(&self) -> String {
        match self.auth_method {
            AuthMethod::ApiKey => format!("apikey:{}", self.user_id),
            AuthMethod::Bearer | AuthMethod::Basic => format!("user:{}", self.user_id),
        }
    }
}

impl From<TokenPayload> for Principal {
    fn from(payload: TokenPayload) -> Self {
        Self {
            user_id: payload.user_id,
            email: Some(payload.email),
            roles: payload.role.into_iter().collect(),
            auth_method: AuthMethod::Bearer,
            claims: payload.extra,
        }
    }
}
