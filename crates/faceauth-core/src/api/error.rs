use serde::Deserialize;
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token missing, invalid or expired")]
    Unauthorized,

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure body shapes the authenticator sends: `{detail}` from framework
/// errors, `{error}` from handler-level failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the human-readable reason out of a failure body, if it has one.
    pub fn extract_detail(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        match parsed.detail {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s),
            // Validation failures carry a list of {msg, loc} objects
            Some(serde_json::Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !msgs.is_empty() {
                    return Some(msgs.join("; "));
                }
            }
            _ => {}
        }
        parsed.error.filter(|e| !e.is_empty())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = Self::extract_detail(body);
        match status.as_u16() {
            400 | 403 | 409 | 422 => {
                ApiError::Rejected(detail.unwrap_or_else(|| Self::truncate_body(body)))
            }
            401 => match detail {
                Some(d) => ApiError::Rejected(d),
                None => ApiError::Unauthorized,
            },
            404 => ApiError::NotFound(Self::truncate_body(body)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// Which failure category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized | ApiError::Rejected(_) => ErrorKind::Auth,
            ApiError::NetworkError(e) if e.is_decode() => ErrorKind::UnexpectedResponse,
            ApiError::NetworkError(_) | ApiError::RateLimited | ApiError::ServerError(_) => {
                ErrorKind::Network
            }
            ApiError::NotFound(_) | ApiError::InvalidResponse(_) => ErrorKind::UnexpectedResponse,
        }
    }
}
