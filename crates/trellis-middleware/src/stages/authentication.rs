//! Authentication middleware.
//!
//! Both middlewares read the `Authorization` header and delegate the actual
//! check to a collaborator port; neither stores secrets.
//!
//! ## Bearer
//!
//! `Authorization: Bearer <token>` is verified by a [`TokenVerifier`]. The
//! verified payload becomes `ctx.user`.
//!
//! ## Basic
//!
//! `Authorization: Basic <base64(user:password)>` must decode to a
//! `user:password` pair. With a [`CredentialVerifier`] configured the pair is
//! verified and the resulting principal becomes `ctx.user`; without one the
//! middleware only gates on the header shape.

use crate::context::Context;
use crate::middleware::{HookResult, HookSet, Middleware};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use trellis_core::ports::{CredentialVerifier, TokenError, TokenVerifier};
use trellis_core::{BoxFuture, PipelineError, Principal};

/// Authorization header.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Message for an absent or malformed Bearer header.
pub const MISSING_BEARER: &str = "Missing or invalid bearer token";

/// Message for a token the verifier rejected.
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Message for an absent or malformed Basic header.
pub const MISSING_BASIC: &str = "Missing or invalid basic auth";

/// Authenticates `Authorization: Bearer <token>` requests.
#[derive(Clone)]
pub struct BearerAuthMiddleware {
    verifier: Arc<dyn TokenVerifier>,
}

impl BearerAuthMiddleware {
    /// Creates the middleware with a token verifier.
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl std::fmt::Debug for BearerAuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for BearerAuthMiddleware {
    fn name(&self) -> &'static str {
        "bearer_auth"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            let token = ctx
                .request
                .header(AUTHORIZATION_HEADER)
                .and_then(|value| credentials(value, "Bearer"))
                .ok_or_else(|| PipelineError::authentication(MISSING_BEARER))?
                .to_string();

            let payload = self.verifier.verify_token(&token).await.map_err(|e| {
                match &e {
                    TokenError::Unavailable(_) => tracing::warn!(
                        request_id = %ctx.request_id(),
                        error = %e,
                        "Token verifier unavailable"
                    ),
                    TokenError::Expired | TokenError::Invalid(_) => tracing::debug!(
                        request_id = %ctx.request_id(),
                        error = %e,
                        "Token rejected"
                    ),
                }
                PipelineError::authentication(INVALID_TOKEN)
            })?;

            let principal = Principal::from(payload);
            tracing::debug!(
                request_id = %ctx.request_id(),
                user = %principal.log_id(),
                "Bearer token accepted"
            );
            ctx.set_user(principal);
            Ok(())
        })
    }
}

/// Authenticates `Authorization: Basic <credentials>` requests.
#[derive(Clone, Default)]
pub struct BasicAuthMiddleware {
    verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl BasicAuthMiddleware {
    /// Creates a middleware that only checks the header shape.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a middleware that verifies credentials.
    #[must_use]
    pub fn with_verifier(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
        }
    }
}

impl std::fmt::Debug for BasicAuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthMiddleware")
            .field("verifies", &self.verifier.is_some())
            .finish()
    }
}

impl Middleware for BasicAuthMiddleware {
    fn name(&self) -> &'static str {
        "basic_auth"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            let (username, password) = ctx
                .request
                .header(AUTHORIZATION_HEADER)
                .and_then(|value| credentials(value, "Basic"))
                .and_then(decode_basic)
                .ok_or_else(|| PipelineError::authentication(MISSING_BASIC))?;

            if let Some(verifier) = &self.verifier {
                let principal = verifier.verify_credentials(&username, &password).await?;
                ctx.set_user(principal);
            }
            Ok(())
        })
    }
}

/// Returns the credentials after `<scheme> `, if the header uses `scheme`.
fn credentials<'h>(header: &'h str, scheme: &str) -> Option<&'h str> {
    let (found, rest) = header.split_once(' ')?;
    if !found.eq_ignore_ascii_case(scheme) {
        return None;
    }
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Request;
    use http::Method;
    use trellis_core::ports::StaticTokenVerifier;
    use trellis_core::{AuthMethod, ErrorCategory, TokenPayload};

    fn bearer() -> BearerAuthMiddleware {
        let verifier = StaticTokenVerifier::new().with_token(
            "good",
            TokenPayload::new("u-1", "a@b.com").with_role("member"),
        );
        BearerAuthMiddleware::new(Arc::new(verifier))
    }

    fn with_auth(value: &str) -> Context {
        Context::new(Request::new(Method::POST, "/").with_header(AUTHORIZATION_HEADER, value))
    }

    struct OnlyAlice;

    impl CredentialVerifier for OnlyAlice {
        fn verify_credentials<'a>(
            &'a self,
            username: &'a str,
            password: &'a str,
        ) -> BoxFuture<'a, Result<Principal, PipelineError>> {
            Box::pin(async move {
                if username == "alice" && password == "s3cret" {
                    Ok(Principal::new("alice", AuthMethod::Basic))
                } else {
                    Err(PipelineError::authentication("Invalid credentials"))
                }
            })
        }
    }

    #[tokio::test]
    async fn test_bearer_sets_principal() {
        let mut ctx = with_auth("Bearer good");
        bearer().before(&mut ctx).await.unwrap();

        let user = ctx.user().unwrap();
        assert_eq!(user.user_id, "u-1");
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
        assert!(user.has_role("member"));
        assert_eq!(user.auth_method, AuthMethod::Bearer);
    }

    #[tokio::test]
    async fn test_bearer_missing_or_malformed_header() {
        for value in [None, Some("Basic abc"), Some("Bearer"), Some("Bearer   ")] {
            let mut ctx = match value {
                Some(v) => with_auth(v),
                None => Context::new(Request::new(Method::POST, "/")),
            };
            let err = bearer().before(&mut ctx).await.unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Authentication);
            assert_eq!(err.message(), MISSING_BEARER);
            assert!(ctx.user().is_none());
        }
    }

    #[tokio::test]
    async fn test_bearer_rejected_token() {
        let mut ctx = with_auth("Bearer bad");
        let err = bearer().before(&mut ctx).await.unwrap_err();
        assert_eq!(err.message(), INVALID_TOKEN);
        assert_eq!(err.status_code().as_u16(), 401);
        assert!(ctx.user().is_none());
    }

    #[tokio::test]
    async fn test_basic_shape_only() {
        let header = format!("Basic {}", STANDARD.encode("bob:pw"));
        let mut ctx = with_auth(&header);
        BasicAuthMiddleware::new().before(&mut ctx).await.unwrap();
        assert!(ctx.user().is_none());

        let no_colon = format!("Basic {}", STANDARD.encode("nocolon"));
        for bad in ["Bearer x", "Basic", "Basic !!!", no_colon.as_str()] {
            let mut ctx = with_auth(bad);
            let err = BasicAuthMiddleware::new().before(&mut ctx).await.unwrap_err();
            assert_eq!(err.message(), MISSING_BASIC);
        }
    }

    #[tokio::test]
    async fn test_basic_with_verifier() {
        let middleware = BasicAuthMiddleware::with_verifier(Arc::new(OnlyAlice));

        let mut ctx = with_auth(&format!("Basic {}", STANDARD.encode("alice:s3cret")));
        middleware.before(&mut ctx).await.unwrap();
        assert_eq!(ctx.user().unwrap().auth_method, AuthMethod::Basic);

        let mut ctx = with_auth(&format!("Basic {}", STANDARD.encode("alice:wrong")));
        let err = middleware.before(&mut ctx).await.unwrap_err();
        assert_eq!(err.message(), "Invalid credentials");
        assert!(ctx.user().is_none());
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(credentials("bearer abc", "Bearer"), Some("abc"));
        assert_eq!(credentials("BASIC abc", "Basic"), Some("abc"));
        assert_eq!(credentials("Token abc", "Bearer"), None);
    }
}
