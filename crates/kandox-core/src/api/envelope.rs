//! The backend's uniform response wrapper.
//!
//! Every JSON response, success or failure, is normalized into
//! `{ statusCode, message, error?, data? }`. The backend is not fully
//! consistent (validation errors carry a list of messages, some auth errors
//! omit `statusCode`, status codes occasionally arrive as strings), so
//! deserialization is deliberately lenient.

use std::fmt;

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::ApiError;

/// A message field that is either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageText {
    Text(String),
    List(Vec<String>),
}

impl Default for MessageText {
    fn default() -> Self {
        MessageText::Text(String::new())
    }
}

impl MessageText {
    /// The first meaningful line: the string itself, or the first list entry.
    pub fn first(&self) -> Option<&str> {
        match self {
            MessageText::Text(s) if !s.is_empty() => Some(s.as_str()),
            MessageText::Text(_) => None,
            MessageText::List(items) => items.iter().map(String::as_str).find(|s| !s.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }
}

impl fmt::Display for MessageText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageText::Text(s) => f.write_str(s),
            MessageText::List(items) => f.write_str(&items.join("; ")),
        }
    }
}

impl From<&str> for MessageText {
    fn from(s: &str) -> Self {
        MessageText::Text(s.to_string())
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<MessageText, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<MessageText>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    #[serde(rename = "statusCode", default, deserialize_with = "lenient_status")]
    pub status_code: u16,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: MessageText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MessageText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl Envelope<Value> {
    /// Normalize a 2xx body. An empty body yields an envelope without data;
    /// a JSON body that is not envelope-shaped becomes the envelope's `data`.
    pub(crate) fn from_success(status: StatusCode, body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::bare(status, MessageText::default()));
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|_| ApiError::invalid_body(status, &String::from_utf8_lossy(body)))?;

        let mut envelope = if value.get("statusCode").is_some() {
            serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))?
        } else {
            Envelope {
                data: Some(value),
                ..Self::bare(status, MessageText::default())
            }
        };
        envelope.fill_status(status);
        Ok(envelope)
    }

    /// Normalize a non-2xx body. Never fails: bodies that are not JSON
    /// objects are carried as the (truncated) message text.
    pub(crate) fn from_failure(status: StatusCode, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let parsed = serde_json::from_slice::<Value>(body)
            .ok()
            .filter(Value::is_object)
            .and_then(|value| serde_json::from_value::<Envelope>(value).ok());

        let mut envelope = match parsed {
            Some(envelope) => envelope,
            None if text.trim().is_empty() => Self::bare(
                status,
                MessageText::Text(status.canonical_reason().unwrap_or_default().to_string()),
            ),
            None => Self::bare(status, MessageText::Text(ApiError::truncate_body(text.trim()))),
        };
        envelope.fill_status(status);
        envelope
    }

    fn bare(status: StatusCode, message: MessageText) -> Self {
        Envelope {
            status_code: status.as_u16(),
            message,
            error: None,
            data: None,
        }
    }

    fn fill_status(&mut self, status: StatusCode) {
        if self.status_code == 0 {
            self.status_code = status.as_u16();
        }
    }

    /// Decode `data` into a typed payload. `Ok(None)` when absent or null.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<Option<T>, ApiError> {
        match self.data {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ApiError::InvalidResponse(format!("Unexpected payload shape: {}", e))),
        }
    }

    /// Decode `data`, turning a data-less envelope into `ApiError::Rejected`.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let status = self.status_code;
        let message = self.reason().unwrap_or_else(|| format!("HTTP {}", status));
        self.into_data()?
            .ok_or(ApiError::Rejected { status, message })
    }
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Human-readable reason: the first message line, else the error text.
    pub fn reason(&self) -> Option<String> {
        self.message
            .first()
            .or_else(|| self.error.as_ref().and_then(MessageText::first))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let body = br#"{"statusCode":200,"message":"fetch account","error":null,"data":{"user":{"id":"1"}}}"#;
        let envelope = Envelope::from_success(StatusCode::OK, body).expect("valid");
        assert!(envelope.is_success());
        assert_eq!(envelope.message, MessageText::from("fetch account"));
        assert_eq!(envelope.data, Some(json!({"user": {"id": "1"}})));
    }

    #[test]
    fn test_success_non_envelope_body_becomes_data() {
        let envelope = Envelope::from_success(StatusCode::OK, br#"[1,2,3]"#).expect("valid");
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.data, Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_success_empty_body() {
        let envelope = Envelope::from_success(StatusCode::OK, b"").expect("valid");
        assert_eq!(envelope.status_code, 200);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_success_invalid_json() {
        let err = Envelope::from_success(StatusCode::OK, b"<html>").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_string_status_code() {
        let body = br#"{"statusCode":"201","message":"created","data":null}"#;
        let envelope = Envelope::from_success(StatusCode::CREATED, body).expect("valid");
        assert_eq!(envelope.status_code, 201);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_failure_validation_messages() {
        let body = br#"{"statusCode":400,"error":"Validation Error","message":["name is required","weight must be positive"]}"#;
        let envelope = Envelope::from_failure(StatusCode::BAD_REQUEST, body);
        assert_eq!(envelope.status_code, 400);
        assert_eq!(envelope.reason().as_deref(), Some("name is required"));
        assert_eq!(envelope.message.to_string(), "name is required; weight must be positive");
    }

    #[test]
    fn test_failure_message_only_body_gets_status() {
        let body = "{\"message\":\"Sai thông tin đăng nhập. Vui lòng kiểm tra lại.\"}".as_bytes();
        let envelope = Envelope::from_failure(StatusCode::BAD_REQUEST, body);
        assert_eq!(envelope.status_code, 400);
        assert_eq!(
            envelope.reason().as_deref(),
            Some("Sai thông tin đăng nhập. Vui lòng kiểm tra lại.")
        );
    }

    #[test]
    fn test_failure_plain_text_and_empty() {
        let envelope = Envelope::from_failure(StatusCode::BAD_GATEWAY, b"upstream down");
        assert_eq!(envelope.status_code, 502);
        assert_eq!(envelope.reason().as_deref(), Some("upstream down"));

        let envelope = Envelope::from_failure(StatusCode::UNAUTHORIZED, b"");
        assert_eq!(envelope.status_code, 401);
        assert_eq!(envelope.reason().as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_reason_falls_back_to_error() {
        let body = br#"{"statusCode":403,"message":"","error":"Forbidden"}"#;
        let envelope = Envelope::from_failure(StatusCode::FORBIDDEN, body);
        assert_eq!(envelope.reason().as_deref(), Some("Forbidden"));
    }

    #[test]
    fn test_into_result() {
        #[derive(Debug, Deserialize)]
        struct Token {
            access_token: String,
        }

        let ok = Envelope::from_success(
            StatusCode::OK,
            br#"{"statusCode":200,"message":"","data":{"access_token":"t"}}"#,
        )
        .expect("valid");
        let token: Token = ok.into_result().expect("has data");
        assert_eq!(token.access_token, "t");

        let rejected = Envelope::from_failure(
            StatusCode::UNAUTHORIZED,
            br#"{"statusCode":401,"error":"Unauthorized","message":"Token expired"}"#,
        );
        match rejected.into_result::<Token>() {
            Err(ApiError::Rejected { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Token expired");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
