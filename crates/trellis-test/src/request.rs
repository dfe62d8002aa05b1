//! Test request building.

use crate::error::TestError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use http_body_util::Full;
use serde::Serialize;
use trellis_middleware::{HttpRequest, PathParams};

/// A request to send through a [`TestClient`](crate::TestClient).
///
/// Builder errors (invalid header, unserializable body) are kept until
/// [`build`](Self::build) so calls can be chained freely.
#[must_use]
#[derive(Debug)]
pub struct TestRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    params: PathParams,
    body: Bytes,
    error: Option<TestError>,
}

impl TestRequest {
    /// Creates a request with any method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            params: PathParams::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Creates a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Sets a header, replacing any previous value.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(TestError::InvalidHeader(name.to_string())),
        }
        self
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn bearer(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header(header::AUTHORIZATION.as_str(), value)
    }

    /// Sets `Authorization: Basic <base64(username:password)>`.
    pub fn basic(self, username: &str, password: &str) -> Self {
        let value = format!("Basic {}", STANDARD.encode(format!("{username}:{password}")));
        self.header(header::AUTHORIZATION.as_str(), value)
    }

    /// Sets a JSON body and `content-type: application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = Bytes::from(body);
                self.header(header::CONTENT_TYPE.as_str(), "application/json")
            }
            Err(e) => {
                self.fail(TestError::Json(e));
                self
            }
        }
    }

    /// Sets a raw text body.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    /// Adds a path parameter, as a router would.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params = self.params.with(name, value);
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Builds the transport request.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while building, or
    /// [`TestError::RequestBuild`] if the URI is invalid.
    pub fn build(self) -> Result<HttpRequest, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri = if self.query.is_empty() {
            self.path
        } else {
            let query = serde_urlencoded::to_string(&self.query)
                .map_err(|e| TestError::RequestBuild(e.to_string()))?;
            format!("{}?{query}", self.path)
        };

        let mut request = http::Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Full::new(self.body))
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;

        *request.headers_mut() = self.headers;
        request.extensions_mut().insert(self.params);
        Ok(request)
    }

    fn fail(&mut self, error: TestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_full_request() {
        let request = TestRequest::post("/chat/42")
            .bearer("tok")
            .json(&json!({ "message": "hi" }))
            .path_param("contextId", "42")
            .query("lang", "en pt")
            .build()
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().path(), "/chat/42");
        assert_eq!(request.uri().query(), Some("lang=en+pt"));
        assert_eq!(request.headers()["authorization"], "Bearer tok");
        assert_eq!(request.headers()["content-type"], "application/json");
        assert_eq!(
            request.extensions().get::<PathParams>(),
            Some(&PathParams::new().with("contextId", "42"))
        );
    }

    #[test]
    fn test_basic_header() {
        let request = TestRequest::get("/").basic("user", "pass").build().unwrap();
        assert_eq!(request.headers()["authorization"], "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_invalid_header_surfaces_on_build() {
        let err = TestRequest::get("/")
            .header("bad header", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, TestError::InvalidHeader(name) if name == "bad header"));
    }
}
