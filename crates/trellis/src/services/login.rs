//! Login and one-time-password flows.

use crate::dto::{LoginRequest, LoginResponse, OtpSent, VerifyOtpRequest};
use crate::services::session::SessionTokens;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use trellis_config::ApiKeysConfig;
use trellis_core::ports::CredentialVerifier;
use trellis_core::{AuthMethod, BoxFuture, PipelineError, PipelineResult, Principal, TokenPayload};
use uuid::Uuid;

/// Issues session tokens for password and OTP logins.
///
/// Credentials are not checked against any user store: any non-empty
/// password is accepted. OTP codes are six digits and single-use.
#[derive(Debug)]
pub struct LoginService {
    tokens: Arc<SessionTokens>,
    pending: Mutex<HashMap<String, String>>,
}

impl LoginService {
    /// Creates the service on top of a token store.
    #[must_use]
    pub fn new(tokens: Arc<SessionTokens>) -> Self {
        Self {
            tokens,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Logs in with email and password.
    ///
    /// # Errors
    ///
    /// Returns an authentication error for an empty password.
    pub fn login(&self, request: &LoginRequest) -> PipelineResult<LoginResponse> {
        if request.password.is_empty() {
            return Err(PipelineError::authentication("Invalid credentials"));
        }
        tracing::info!(channel = %request.channel, "Password login");
        Ok(self.issue(&request.email))
    }

    /// Generates a code for `email`, replacing any pending one.
    pub fn send_otp(&self, email: &str) -> OtpSent {
        let code = format!("{:06}", Uuid::now_v7().as_u128() % 1_000_000);
        self.pending.lock().insert(normalize(email), code);
        tracing::info!("OTP issued");
        OtpSent {
            message: "OTP sent successfully".to_string(),
        }
    }

    /// Returns the pending code for `email`.
    ///
    /// Stands in for the delivery channel in development and tests.
    #[must_use]
    pub fn pending_code(&self, email: &str) -> Option<String> {
        self.pending.lock().get(&normalize(email)).cloned()
    }

    /// Exchanges a pending code for a token.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if no matching code is pending.
    pub fn verify_otp(&self, request: &VerifyOtpRequest) -> PipelineResult<LoginResponse> {
        let email = normalize(&request.email);
        let mut pending = self.pending.lock();
        match pending.get(&email) {
            Some(code) if *code == request.verification => {
                pending.remove(&email);
                drop(pending);
                Ok(self.issue(&email))
            }
            _ => Err(PipelineError::authentication("Invalid verification code")),
        }
    }

    fn issue(&self, email: &str) -> LoginResponse {
        let user = normalize(email);
        let issued = self.tokens.issue(TokenPayload::new(user.clone(), user.clone()));
        LoginResponse {
            user,
            token: issued.token.clone(),
            expires_at: issued.expires_at_rfc3339(),
        }
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Verifies Basic credentials of the form `<category>:<api key>`.
///
/// Only the configured category is accepted, so a guest key cannot open
/// a login flow.
#[derive(Debug, Clone)]
pub struct ApiKeyCredentials {
    category: String,
    keys: Arc<ApiKeysConfig>,
}

impl ApiKeyCredentials {
    /// Creates a verifier accepting the key of `category`.
    #[must_use]
    pub fn new(category: impl Into<String>, keys: Arc<ApiKeysConfig>) -> Self {
        Self {
            category: category.into().to_ascii_lowercase(),
            keys,
        }
    }
}

impl CredentialVerifier for ApiKeyCredentials {
    fn verify_credentials<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Principal, PipelineError>> {
        Box::pin(async move {
            if !username.eq_ignore_ascii_case(&self.category) {
                return Err(PipelineError::authentication("Invalid client credentials"));
            }
            match self.keys.get(&self.category) {
                Some(expected) if expected == password => {
                    Ok(Principal::new(self.category.clone(), AuthMethod::Basic))
                }
                _ => Err(PipelineError::authentication("Invalid client credentials")),
            }
        })
    }
}
