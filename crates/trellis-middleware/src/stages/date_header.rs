//! Stamps every response with the time processing began.

use crate::context::Context;
use crate::envelope::timestamp;
use crate::middleware::{HookResult, HookSet, Middleware};
use http::header::{HeaderName, HeaderValue};
use trellis_core::{BoxFuture, PipelineError};

/// Response header set by [`DateHeaderMiddleware`].
pub const DATE_HEADER: &str = "x-date";

/// Sets `x-date` to the current ISO-8601 UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateHeaderMiddleware;

impl DateHeaderMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for DateHeaderMiddleware {
    fn name(&self) -> &'static str {
        "date_header"
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE
    }

    fn before<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            let value = HeaderValue::from_str(&timestamp())
                .map_err(|e| PipelineError::internal_with_source("Invalid date header", e))?;
            ctx.response
                .set_header(HeaderName::from_static(DATE_HEADER), value);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Request;
    use http::Method;

    #[tokio::test]
    async fn test_sets_iso_date() {
        let mut ctx = Context::new(Request::new(Method::GET, "/weather"));
        DateHeaderMiddleware::new().before(&mut ctx).await.unwrap();

        let value = ctx.response.headers()[DATE_HEADER].to_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(value).is_ok());
    }
}
