//! Test client for in-memory pipeline testing.

use crate::error::TestError;
use crate::request::TestRequest;
use crate::response::TestResponse;
use trellis_middleware::Pipeline;

/// Drives a built [`Pipeline`] without any server.
///
/// Requests go through [`Pipeline::process`], so they see exactly what a
/// host would: header parsing, query decoding, path parameters and the
/// `x-request-id` echo.
///
/// # Example
///
/// ```
/// use trellis_middleware::Pipeline;
/// use trellis_middleware::stages::{ErrorTranslatorMiddleware, ResponseEnvelopeMiddleware};
/// use trellis_test::{TestClient, TestRequest};
/// use http::StatusCode;
///
/// # tokio_test::block_on(async {
/// let pipeline = Pipeline::builder()
///     .with(ErrorTranslatorMiddleware::new())
///     .with(ResponseEnvelopeMiddleware::new())
///     .handle(|ctx| {
///         Box::pin(async move {
///             ctx.response.set_response_body("pong".into());
///             Ok(())
///         })
///     });
///
/// let client = TestClient::new(pipeline);
/// let response = client.send(TestRequest::get("/ping")).await;
///
/// response.assert_status(StatusCode::OK);
/// assert_eq!(response.assert_success_envelope(), "pong");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TestClient {
    pipeline: Pipeline,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for `pipeline`.
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request unless the request sets it.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the pipeline under test.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Sends a request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    pub async fn send(&self, request: TestRequest) -> TestResponse {
        match self.try_send(request).await {
            Ok(response) => response,
            Err(e) => panic!("request should build: {e}"),
        }
    }

    /// Sends a request, returning build errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built.
    pub async fn try_send(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let mut request = request.build()?;
        for (name, value) in &self.default_headers {
            let name = http::HeaderName::try_from(name.as_str())
                .map_err(|_| TestError::InvalidHeader(name.clone()))?;
            let value = http::HeaderValue::try_from(value.as_str())
                .map_err(|_| TestError::InvalidHeader(name.to_string()))?;
            if !request.headers().contains_key(&name) {
                request.headers_mut().insert(name, value);
            }
        }
        let response = self.pipeline.process(request).await;
        Ok(TestResponse::from_http(response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;
    use trellis_core::PipelineError;
    use trellis_middleware::stages::{
        ApiKeyMiddleware, ErrorTranslatorMiddleware, ResponseEnvelopeMiddleware,
    };

    fn echo_headers() -> Pipeline {
        Pipeline::builder()
            .with(ErrorTranslatorMiddleware::new())
            .with(ResponseEnvelopeMiddleware::new())
            .handle(|ctx| {
                Box::pin(async move {
                    let tenant = ctx.request.header("x-tenant").map(str::to_string);
                    let page = ctx.request.query.get("page").cloned();
                    ctx.response.set_response_body(json!({
                        "tenant": tenant,
                        "page": page,
                        "id": ctx.request.param("id"),
                    }));
                    Ok(())
                })
            })
    }

    #[tokio::test]
    async fn test_round_trip() {
        let client = TestClient::new(echo_headers()).with_default_header("x-tenant", "acme");

        let response = client
            .send(TestRequest::get("/items/3").path_param("id", "3").query("page", "2"))
            .await;

        response.assert_status(StatusCode::OK).assert_json();
        assert!(response.request_id().is_some());
        assert_eq!(
            response.assert_success_envelope(),
            json!({ "tenant": "acme", "page": "2", "id": "3" })
        );
    }

    #[tokio::test]
    async fn test_request_header_overrides_default() {
        let client = TestClient::new(echo_headers()).with_default_header("x-tenant", "acme");
        let response = client
            .send(TestRequest::get("/").header("x-tenant", "other"))
            .await;
        assert_eq!(response.assert_success_envelope()["tenant"], "other");
    }

    #[tokio::test]
    async fn test_error_round_trip() {
        let keys = trellis_config::ApiKeysConfig::new().with_key("guest", "k");
        let pipeline = Pipeline::builder()
            .with(ErrorTranslatorMiddleware::new())
            .with(ApiKeyMiddleware::new("guest", std::sync::Arc::new(keys)))
            .handle(|_| Box::pin(async { Err(PipelineError::internal("unreachable")) }));

        let response = TestClient::new(pipeline).send(TestRequest::post("/")).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_error_envelope("API key is required");
    }

    #[tokio::test]
    async fn test_try_send_reports_build_errors() {
        let client = TestClient::new(echo_headers());
        let result = client.try_send(TestRequest::get("/").header("bad header", "x")).await;
        assert!(matches!(result, Err(TestError::InvalidHeader(_))));
    }
}
