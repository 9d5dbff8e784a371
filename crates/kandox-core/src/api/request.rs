use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;

use super::ApiError;

/// Marker header that exempts a request from credential attachment and from
/// the 401 → refresh → retry loop.
pub const NO_RETRY_HEADER: &str = "x-no-retry";

/// How the response body should be handed back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseKind {
    /// Normalize into an [`Envelope`](super::Envelope).
    #[default]
    Json,
    /// Raw bytes (file download); returned without envelope unwrapping.
    Binary,
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Raw { content_type: String, bytes: Vec<u8> },
}

/// An outbound call. Owned and cloneable so it can be replayed after a
/// credential refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub response_kind: ResponseKind,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            response_kind: ResponseKind::Json,
            retried: false,
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

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn raw(mut self, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.body = RequestBody::Raw {
            content_type: content_type.into(),
            bytes,
        };
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, ApiError> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }

    pub fn binary(mut self) -> Self {
        self.response_kind = ResponseKind::Binary;
        self
    }

    /// Pre-mark the request so it is never refreshed or retried and never
    /// picks up the stored credential.
    pub fn no_retry(mut self) -> Self {
        self.mark_retried();
        self
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// True when the request carries the no-retry marker, either set by the
    /// pipeline or supplied by the caller as a header.
    pub fn has_no_retry_marker(&self) -> bool {
        self.retried || self.headers.contains_key(NO_RETRY_HEADER)
    }

    /// One-way transition: once retried, always retried.
    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
        self.headers
            .insert(NO_RETRY_HEADER, HeaderValue::from_static("true"));
    }

    pub(crate) fn set_bearer(&mut self, token: &str) -> Result<(), ApiError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        value.set_sensitive(true);
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_retried_sets_marker_header() {
        let mut request = ApiRequest::get("/api/v1/roles");
        assert!(!request.is_retried());
        assert!(!request.has_no_retry_marker());

        request.mark_retried();
        assert!(request.is_retried());
        assert_eq!(
            request.headers.get(NO_RETRY_HEADER).and_then(|v| v.to_str().ok()),
            Some("true")
        );
    }

    #[test]
    fn test_caller_supplied_marker() {
        let request = ApiRequest::get("/api/v1/roles")
            .header(HeaderName::from_static(NO_RETRY_HEADER), "true")
            .expect("valid header");
        assert!(!request.is_retried());
        assert!(request.has_no_retry_marker());
    }

    #[test]
    fn test_set_bearer_is_sensitive() {
        let mut request = ApiRequest::get("/api/v1/users");
        request.set_bearer("token2").expect("valid token");
        let value = request
            .headers
            .get(header::AUTHORIZATION)
            .expect("authorization set");
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().ok(), Some("Bearer token2"));
    }

    #[test]
    fn test_builders() {
        let request = ApiRequest::post("/api/v1/changs")
            .json(&serde_json::json!({"name": "Q1", "weight": 2}))
            .expect("serializable")
            .query("page", "1");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.query, vec![("page".to_string(), "1".to_string())]);
        assert!(matches!(request.body, RequestBody::Json(_)));
        assert_eq!(ApiRequest::get("/f").binary().response_kind, ResponseKind::Binary);
    }
}
