//! The transport seam: one request in, one response (or no response) out.
//!
//! Production code uses [`ReqwestTransport`]; tests script responses with
//! `testing::FakeTransport`.

mod http;

pub use http::ReqwestTransport;
pub use reqwest::{Method, StatusCode};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::future::Future;

use crate::error::{RequestError, TransportError};

/// Marker header that opts a request out of refresh and bearer injection.
/// Stripped by the pipeline before the request is sent.
pub const SKIP_AUTH_HEADER: &str = "x-tokenkeep-skip-auth";

pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the transport's base URL, starting with `/`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Skip the pre-flight refresh, bearer injection and 401 handling.
    pub fn without_auth(self) -> Self {
        self.header(
            HeaderName::from_static(SKIP_AUTH_HEADER),
            HeaderValue::from_static("1"),
        )
    }

    pub fn skips_auth(&self) -> bool {
        self.headers.contains_key(SKIP_AUTH_HEADER)
    }

    pub(crate) fn take_skip_auth(&mut self) -> bool {
        self.headers.remove(SKIP_AUTH_HEADER).is_some()
    }

    /// Token from an `Authorization: Bearer` header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_str(&self.body).map_err(|e| RequestError::MalformedBody(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_auth_marker_is_detected_and_removed() {
        let mut request = HttpRequest::get("/public").without_auth();
        assert!(request.skips_auth());

        assert!(request.take_skip_auth());
        assert!(!request.skips_auth());
        assert!(!request.take_skip_auth());
    }

    #[test]
    fn reads_bearer_token() {
        let request = HttpRequest::get("/x").header(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer abc"),
        );
        assert_eq!(request.bearer_token(), Some("abc"));
        assert_eq!(HttpRequest::get("/x").bearer_token(), None);
    }

    #[test]
    fn malformed_json_body_is_a_request_error() {
        let response = HttpResponse::new(StatusCode::OK, "<html>");
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, RequestError::MalformedBody(_)));
    }
}
