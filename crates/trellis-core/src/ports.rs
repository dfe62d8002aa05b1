//! Collaborator ports.
//!
//! The pipeline never verifies tokens or credentials itself. Authentication
//! middleware delegates to these traits; implementations live with the
//! services that own the secrets.

use crate::{BoxFuture, PipelineError, Principal, TokenPayload};
use std::collections::HashMap;
use thiserror::Error;

/// Why a token was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token was well-formed but has expired.
    #[error("token expired")]
    Expired,
    /// The token is unknown, malformed or its signature is wrong.
    #[error("token invalid: {0}")]
    Invalid(String),
    /// The verifier itself could not be reached.
    #[error("token verifier unavailable: {0}")]
    Unavailable(String),
}

/// Verifies bearer tokens.
///
/// Implementations must be safe to call from many requests at once.
pub trait TokenVerifier: Send + Sync + 'static {
    /// Verifies `token` and returns its payload.
    fn verify_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<TokenPayload, TokenError>>;
}

/// Verifies decoded Basic credentials.
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Checks `username`/`password` and returns the matching principal.
    ///
    /// A rejection should be reported as [`PipelineError::Authentication`].
    fn verify_credentials<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Principal, PipelineError>>;
}

/// A token verifier backed by a fixed token table.
///
/// Useful for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, TokenPayload>,
}

impl StaticTokenVerifier {
    /// Creates an empty verifier that rejects every token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token` and resolves it to `payload`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, payload: TokenPayload) -> Self {
        self.tokens.insert(token.into(), payload);
        self
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<TokenPayload, TokenError>> {
        Box::pin(async move {
            self.tokens
                .get(token)
                .cloned()
                .ok_or_else(|| TokenError::Invalid("unknown token".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_verifier_accepts_known_token() {
        let verifier =
            StaticTokenVerifier::new().with_token("good", TokenPayload::new("u-1", "a@b.com"));

        let payload = verifier.verify_token("good").await.unwrap();
        assert_eq!(payload.user_id, "u-1");
    }

    #[tokio::test]
    async fn test_static_verifier_rejects_unknown_token() {
        let verifier = StaticTokenVerifier::new();
        let err = verifier.verify_token("bad").await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }
}
