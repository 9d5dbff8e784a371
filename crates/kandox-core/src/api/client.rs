//! API client for the Kandox backend.
//!
//! `ApiClient::send` is the single entry point for every backend call. It
//! attaches the stored bearer token, recovers from an expired token with one
//! shared refresh and a single retry, and normalizes every HTTP outcome into
//! a [`Reply`]. HTTP error statuses are returned as envelopes, not errors.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::endpoint::{is_auth_endpoint, is_refresh_endpoint, REFRESH_PATH};
use crate::config::Config;
use crate::context::AuthContext;
use crate::models::AccessToken;
use crate::notify::Notice;

use super::request::{RequestBody, ResponseKind};
use super::{ApiError, ApiRequest, Envelope};

/// Shown when the backend rejects a refresh without saying why.
const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired, please sign in again.";

/// Shown when the refresh call does not answer within the refresh timeout.
const REFRESH_TIMEOUT_MESSAGE: &str = "Session refresh timed out, please sign in again.";

/// A raw file download, returned without envelope unwrapping.
#[derive(Debug, Clone)]
pub struct Download {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum Reply {
    Envelope(Envelope),
    Binary(Download),
}

impl Reply {
    pub fn status(&self) -> u16 {
        match self {
            Reply::Envelope(envelope) => envelope.status_code,
            Reply::Binary(download) => download.status,
        }
    }

    pub fn into_envelope(self) -> Result<Envelope, ApiError> {
        match self {
            Reply::Envelope(envelope) => Ok(envelope),
            Reply::Binary(download) => Err(ApiError::InvalidResponse(format!(
                "Expected a JSON envelope, got {} bytes of {}",
                download.bytes.len(),
                download.content_type.as_deref().unwrap_or("binary data")
            ))),
        }
    }

    /// The download, or the failure envelope turned into `Rejected`.
    pub fn into_download(self) -> Result<Download, ApiError> {
        match self {
            Reply::Binary(download) => Ok(download),
            Reply::Envelope(envelope) => {
                let status = envelope.status_code;
                let message = envelope.reason().unwrap_or_else(|| format!("HTTP {}", status));
                Err(ApiError::Rejected { status, message })
            }
        }
    }
}

/// Clone is cheap: reqwest::Client and the context are both reference-counted.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    context: Arc<AuthContext>,
    refresh_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config, context: Arc<AuthContext>) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            context,
            refresh_timeout: config.refresh_timeout(),
        })
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn context(&self) -> &Arc<AuthContext> {
        &self.context
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Dispatch `request`, refreshing the credential and retrying once on 401.
    ///
    /// Only transport failures and undecodable success bodies are `Err`.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Reply, ApiError> {
        let reply = self.exchange(&request).await?;

        if reply.status() == StatusCode::UNAUTHORIZED.as_u16() && self.may_refresh(&request) {
            let refreshed = self.refresh_access_token().await;
            request.mark_retried();

            if let Some(token) = refreshed {
                request.set_bearer(&token)?;
                debug!(path = %request.path, "Retrying after refresh");
                let retried = self.exchange(&request).await?;
                self.inspect_failure(&request, &retried);
                return Ok(retried);
            }
            debug!(path = %request.path, "Refresh yielded no token");
            return Ok(reply);
        }

        self.inspect_failure(&request, &reply);
        Ok(reply)
    }

    /// Send and decode the envelope's `data` as `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.into_envelope()?.into_result()
    }

    pub async fn get(&self, path: &str) -> Result<Envelope, ApiError> {
        self.send(ApiRequest::get(path)).await?.into_envelope()
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Envelope, ApiError> {
        self.send(ApiRequest::post(path).json(body)?).await?.into_envelope()
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Envelope, ApiError> {
        self.send(ApiRequest::put(path).json(body)?).await?.into_envelope()
    }

    pub async fn delete(&self, path: &str) -> Result<Envelope, ApiError> {
        self.send(ApiRequest::delete(path)).await?.into_envelope()
    }

    pub async fn download(&self, path: &str) -> Result<Download, ApiError> {
        self.send(ApiRequest::get(path).binary()).await?.into_download()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Eligible for the 401 → refresh → retry path?
    fn may_refresh(&self, request: &ApiRequest) -> bool {
        !is_auth_endpoint(&request.path) && !request.has_no_retry_marker()
    }

    /// Headers as sent: the caller's, a default `Accept`, and the stored
    /// credential unless the request is exempt.
    fn outbound(&self, request: &ApiRequest) -> Result<HeaderMap, ApiError> {
        let mut headers = request.headers.clone();
        if !headers.contains_key(header::ACCEPT) {
            headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        }
        if !is_auth_endpoint(&request.path) && !request.has_no_retry_marker() {
            if let Some(token) = self.context.credentials().token() {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
                value.set_sensitive(true);
                headers.insert(header::AUTHORIZATION, value);
            }
        }
        Ok(headers)
    }

    /// One network round trip, no recovery.
    async fn exchange(&self, request: &ApiRequest) -> Result<Reply, ApiError> {
        let url = self.url(&request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(self.outbound(request)?);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Raw { content_type, bytes } => builder
                .header(header::CONTENT_TYPE, content_type.as_str())
                .body(bytes.clone()),
        };

        debug!(method = %request.method, url = %url, retried = request.is_retried(), "Sending request");
        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        if !status.is_success() {
            debug!(status = %status, url = %url, "Request failed");
            return Ok(Reply::Envelope(Envelope::from_failure(status, &bytes)));
        }

        match request.response_kind {
            ResponseKind::Binary => Ok(Reply::Binary(Download {
                status: status.as_u16(),
                content_type,
                bytes: bytes.to_vec(),
            })),
            ResponseKind::Json => Ok(Reply::Envelope(Envelope::from_success(status, &bytes)?)),
        }
    }

    /// Side effects of a failed reply: terminal refresh rejection and 403 notices.
    fn inspect_failure(&self, request: &ApiRequest, reply: &Reply) {
        let Reply::Envelope(envelope) = reply else {
            return;
        };

        match envelope.status_code {
            400 if is_refresh_endpoint(&request.path) && self.context.view().is_protected() => {
                let message = envelope
                    .error
                    .as_ref()
                    .and_then(|e| e.first())
                    .map(str::to_string)
                    .unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string());
                self.terminate_session(&message);
            }
            403 => {
                let title = envelope.message.to_string();
                let description = envelope.error.as_ref().map(ToString::to_string).unwrap_or_default();
                debug!(path = %request.path, "Forbidden");
                self.context.notifier().notify(Notice::new(title, description));
            }
            _ => {}
        }
    }

    fn terminate_session(&self, message: &str) {
        if let Err(e) = self.context.credentials().clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
        self.context.observer().session_invalidated(message);
    }

    /// Shared refresh: joins the in-flight operation or starts one.
    async fn refresh_access_token(&self) -> Option<String> {
        let client = self.clone();
        self.context
            .refresh()
            .refresh(move || client.request_new_token().boxed())
            .await
    }

    /// The refresh network call. Commits the new token before returning it.
    async fn request_new_token(self) -> Option<String> {
        let request = ApiRequest::get(REFRESH_PATH).no_retry();

        let reply = match tokio::time::timeout(self.refresh_timeout, self.exchange(&request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(error = %e, "Refresh request failed");
                return None;
            }
            Err(_) => {
                warn!(timeout_ms = self.refresh_timeout.as_millis() as u64, "Refresh timed out");
                if self.context.view().is_protected() {
                    self.terminate_session(REFRESH_TIMEOUT_MESSAGE);
                }
                return None;
            }
        };

        self.inspect_failure(&request, &reply);
        let envelope = match reply {
            Reply::Envelope(envelope) if envelope.is_success() => envelope,
            other => {
                debug!(status = other.status(), "Refresh rejected");
                return None;
            }
        };

        match envelope.into_data::<AccessToken>() {
            Ok(Some(AccessToken { access_token })) => {
                if let Err(e) = self.context.credentials().store(&access_token) {
                    warn!(error = %e, "Failed to persist refreshed token");
                }
                info!("Access token refreshed");
                Some(access_token)
            }
            Ok(None) => {
                warn!("Refresh response carried no token");
                None
            }
            Err(e) => {
                warn!(error = %e, "Unreadable refresh response");
                None
            }
        }
    }
}
