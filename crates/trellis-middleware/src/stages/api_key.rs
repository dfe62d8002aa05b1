//! API key gate.
//!
//! Requires `x-api-key` to equal the key configured for one category of
//! [`ApiKeysConfig`]. Missing and wrong keys are reported with distinct
//! messages; a category with no configured key rejects every request.

use crate::context::Context;
use crate::middleware::{HookResult, HookSet, Middleware};
use std::sync::Arc;
use trellis_config::ApiKeysConfig;
use trellis_core::{BoxFuture, PipelineError};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Message for a request without a key.
pub const KEY_REQUIRED: &str = "API key is required";

/// Message for a request with the wrong key.
pub const KEY_INVALID: &str = "Invalid API key";

/// Gates requests on an API key category.
#[derive(Debug, Clone)]
pub struct ApiKeyMiddleware {
    category: String,
    keys: Arc<ApiKeysConfig>,
}

impl ApiKeyMiddleware {
    /// Creates a gate for `category` backed by the configured keys.
    #[must_use]
    pub fn new(category: impl Into<String>, keys: Arc<ApiKeysConfig>) -> Self {
        let category = category.into();
        if keys.get(&category).is_none() {
            tracing::warn!(
                category = %category,
                "No API key configured for category, every request will be rejected"
            );
        }
        Self { category, keys }
    }

    /// Returns the gated category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }
}

impl Middleware for ApiKeyMiddleware {
    fn name(&self) -> &'static str {
        "api_key"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            let provided = ctx
                .request
                .header(API_KEY_HEADER)
                .filter(|key| !key.is_empty())
                .ok_or_else(|| PipelineError::authentication(KEY_REQUIRED))?;

            match self.keys.get(&self.category) {
                Some(expected) if expected == provided => Ok(()),
                _ => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        category = %self.category,
                        "API key rejected"
                    );
                    Err(PipelineError::authentication(KEY_INVALID))
                }
            }
        })
    }
}
