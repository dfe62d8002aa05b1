//! The reference pipelines.
//!
//! Every pipeline branches from the same prefix: dependency injection
//! followed by the error translator. Login flows then gate on Basic
//! credentials holding the `login` API key, member flows on a bearer token
//! and guest flows on the `guest` API key.
//!
//! ```text
//! login / request-otp / verify-otp
//!     DI -> errors -> basic auth -> body parser -> validation -> envelope
//! member message
//!     DI -> errors -> bearer auth -> body parser -> validation -> envelope
//! member history
//!     DI -> errors -> bearer auth -> path params -> envelope
//! guest message
//!     DI -> errors -> api key -> body parser -> validation -> envelope
//! ```

use crate::dto::{ChatRequest, LoginRequest, SentOtpRequest, VerifyOtpRequest};
use crate::services::{ApiKeyCredentials, ChatService, LoginService, SessionTokens};
use std::sync::Arc;
use trellis_config::{ApiKeysConfig, TrellisConfig};
use trellis_core::di::Container;
use trellis_core::PipelineError;
use trellis_middleware::stages::{
    ApiKeyMiddleware, BasicAuthMiddleware, BearerAuthMiddleware, BodyParserMiddleware,
    DependencyInjectionMiddleware, ErrorTranslatorMiddleware, RequiredPathParamsMiddleware,
    ResponseEnvelopeMiddleware, SchemaValidationMiddleware,
};
use trellis_middleware::{BoxFuture, Context, HookResult, Pipeline, PipelineBuilder};

/// Path parameter naming the user whose history is read.
pub const USER_ID_PARAM: &str = "userId";

/// Everything the reference pipelines share.
///
/// Built once at startup; pipelines hold `Arc`s into it.
#[derive(Debug, Clone)]
pub struct Services {
    /// Loaded configuration.
    pub config: Arc<TrellisConfig>,
    /// Session token store.
    pub tokens: Arc<SessionTokens>,
    /// Service container injected into every request.
    pub container: Arc<Container>,
}

impl Services {
    /// Wires the mock services for `config`.
    #[must_use]
    pub fn new(config: TrellisConfig) -> Self {
        let tokens = Arc::new(SessionTokens::from_config(&config.auth));
        let container = Container::builder()
            .register(Arc::clone(&tokens))
            .register(Arc::new(LoginService::new(Arc::clone(&tokens))))
            .register(Arc::new(ChatService::new()))
            .build();

        Self {
            config: Arc::new(config),
            tokens,
            container,
        }
    }

    fn api_keys(&self) -> Arc<ApiKeysConfig> {
        Arc::new(self.config.api_keys.clone())
    }

    /// The prefix every reference pipeline starts with.
    #[must_use]
    pub fn base(&self) -> PipelineBuilder {
        Pipeline::builder()
            .with(DependencyInjectionMiddleware::new(Arc::clone(&self.container)))
            .with(ErrorTranslatorMiddleware::new())
    }

    fn login_gate(&self) -> PipelineBuilder {
        let credentials = ApiKeyCredentials::new(ApiKeysConfig::LOGIN, self.api_keys());
        self.base()
            .with(BasicAuthMiddleware::with_verifier(Arc::new(credentials)))
            .with(BodyParserMiddleware::new())
    }

    fn member_gate(&self) -> PipelineBuilder {
        let tokens: Arc<SessionTokens> = Arc::clone(&self.tokens);
        self.base().with(BearerAuthMiddleware::new(tokens))
    }

    /// `POST /login`.
    #[must_use]
    pub fn login_pipeline(&self) -> Pipeline {
        self.login_gate()
            .with(SchemaValidationMiddleware::new(LoginRequest::schema()))
            .with(ResponseEnvelopeMiddleware::new())
            .handle(login)
    }

    /// `POST /guest/request-otp`.
    #[must_use]
    pub fn request_otp_pipeline(&self) -> Pipeline {
        self.login_gate()
            .with(SchemaValidationMiddleware::new(SentOtpRequest::schema()))
            .with(ResponseEnvelopeMiddleware::new())
            .handle(request_otp)
    }

    /// `POST /guest/verify-otp`.
    #[must_use]
    pub fn verify_otp_pipeline(&self) -> Pipeline {
        self.login_gate()
            .with(SchemaValidationMiddleware::new(VerifyOtpRequest::schema()))
            .with(ResponseEnvelopeMiddleware::new())
            .handle(verify_otp)
    }

    /// `POST /messages`.
    #[must_use]
    pub fn member_message_pipeline(&self) -> Pipeline {
        self.member_gate()
            .with(BodyParserMiddleware::new())
            .with(SchemaValidationMiddleware::new(ChatRequest::schema()))
            .with(ResponseEnvelopeMiddleware::new())
            .handle(member_message)
    }

    /// `GET /messages/{userId}`.
    #[must_use]
    pub fn member_history_pipeline(&self) -> Pipeline {
        self.member_gate()
            .with(RequiredPathParamsMiddleware::new([USER_ID_PARAM]))
            .with(ResponseEnvelopeMiddleware::new())
            .handle(member_history)
    }

    /// `POST /guest/messages`.
    #[must_use]
    pub fn guest_message_pipeline(&self) -> Pipeline {
        self.base()
            .with(ApiKeyMiddleware::new(ApiKeysConfig::GUEST, self.api_keys()))
            .with(BodyParserMiddleware::new())
            .with(SchemaValidationMiddleware::new(ChatRequest::schema()))
            .with(ResponseEnvelopeMiddleware::new())
            .handle(guest_message)
    }
}

fn login(ctx: &mut Context) -> BoxFuture<'_, HookResult> {
    Box::pin(async move {
        let request: LoginRequest = ctx.validated_body_as()?;
        let response = ctx.resolve::<LoginService>()?.login(&request)?;
        ctx.response.set_response_body(serde_json::to_value(response)?);
        Ok(())
    })
}

fn request_otp(ctx: &mut Context) -> BoxFuture<'_, HookResult> {
    Box::pin(async move {
        let request: SentOtpRequest = ctx.validated_body_as()?;
        let sent = ctx.resolve::<LoginService>()?.send_otp(&request.email);
        ctx.response.set_response_body(serde_json::to_value(sent)?);
        Ok(())
    })
}

fn verify_otp(ctx: &mut Context) -> BoxFuture<'_, HookResult> {
    Box::pin(async move {
        let request: VerifyOtpRequest = ctx.validated_body_as()?;
        let response = ctx.resolve::<LoginService>()?.verify_otp(&request)?;
        ctx.response.set_response_body(serde_json::to_value(response)?);
        Ok(())
    })
}

fn member_message(ctx: &mut Context) -> BoxFuture<'_, HookResult> {
    Box::pin(async move {
        let owner = ctx.require_user()?.user_id.clone();
        let request: ChatRequest = ctx.validated_body_as()?;
        let reply = ctx.resolve::<ChatService>()?.reply(Some(&owner), &request);
        ctx.response.set_response_body(serde_json::to_value(reply)?);
        Ok(())
    })
}

fn member_history(ctx: &mut Context) -> BoxFuture<'_, HookResult> {
    Box::pin(async move {
        let owner = ctx.require_user()?.user_id.clone();
        let requested = ctx.request.param(USER_ID_PARAM).unwrap_or_default();
        if !requested.eq_ignore_ascii_case(&owner) {
            return Err(PipelineError::authorization(
                "Cannot read another user's messages",
            ));
        }
        let history = ctx.resolve::<ChatService>()?.history(&owner);
        ctx.response.set_response_body(serde_json::to_value(history)?);
        Ok(())
    })
}

fn guest_message(ctx: &mut Context) -> BoxFuture<'_, HookResult> {
    Box::pin(async move {
        let request: ChatRequest = ctx.validated_body_as()?;
        let reply = ctx.resolve::<ChatService>()?.reply(None, &request);
        ctx.response.set_response_body(serde_json::to_value(reply)?);
        Ok(())
    })
}
