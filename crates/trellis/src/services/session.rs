//! In-memory session tokens.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use trellis_config::AuthConfig;
use trellis_core::ports::{TokenError, TokenVerifier};
use trellis_core::{BoxFuture, TokenPayload};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Session {
    payload: TokenPayload,
    expires_at: DateTime<Utc>,
}

/// A freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Opaque bearer token.
    pub token: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Expiry as ISO-8601 UTC.
    #[must_use]
    pub fn expires_at_rfc3339(&self) -> String {
        self.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Issues opaque tokens and verifies them for [`BearerAuthMiddleware`].
///
/// Tokens are UUID v7 strings held in memory until they expire or are
/// revoked. Expired tokens are dropped the first time they are presented.
///
/// [`BearerAuthMiddleware`]: trellis_middleware::stages::BearerAuthMiddleware
#[derive(Debug)]
pub struct SessionTokens {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionTokens {
    /// Creates a store whose tokens live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store from the token settings.
    #[must_use]
    pub fn from_config(auth: &AuthConfig) -> Self {
        let secs = i64::try_from(auth.token_ttl_secs).unwrap_or(i64::MAX);
        Self::new(Duration::try_seconds(secs).unwrap_or_else(|| Duration::weeks(5200)))
    }

    /// Issues a token for `payload`.
    ///
    /// Expired sessions are dropped on every issue, so the store only grows
    /// with live tokens.
    pub fn issue(&self, payload: TokenPayload) -> IssuedToken {
        let token = Uuid::now_v7().simple().to_string();
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        tracing::debug!(user = %payload.user_id, %expires_at, "Issued session token");
        let mut sessions = self.sessions.write();
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            token.clone(),
            Session {
                payload,
                expires_at,
            },
        );
        drop(sessions);

        IssuedToken { token, expires_at }
    }

    /// Revokes `token`. Returns `true` if it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    /// Returns the number of tokens held, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no token is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn lookup(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read();
            match sessions.get(token) {
                None => return Err(TokenError::Invalid("unknown token".to_string())),
                Some(session) if session.expires_at > now => return Ok(session.payload.clone()),
                Some(_) => {}
            }
        }

        self.sessions.write().remove(token);
        Err(TokenError::Expired)
    }
}

impl TokenVerifier for SessionTokens {
    fn verify_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<TokenPayload, TokenError>> {
        Box::pin(async move { self.lookup(token) })
    }
}
