use thiserror::Error;

use crate::utils::truncate_string;

/// Failures that surface as `Err` from the client.
///
/// HTTP error statuses are *not* represented here: they resolve as
/// [`Envelope`](super::Envelope) values so callers branch on `status_code`.
/// Only transport problems, undecodable success bodies and the typed helpers
/// on `Envelope` produce an `ApiError`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.chars().count() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{} (truncated, {} total bytes)",
                truncate_string(body, MAX_ERROR_BODY_LENGTH),
                body.len()
            )
        }
    }

    pub(crate) fn invalid_body(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::InvalidResponse(format!("Status {}: {}", status, Self::truncate_body(body)))
    }

    /// HTTP status carried by a rejected envelope, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}
