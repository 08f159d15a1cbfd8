use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    #[error("Unauthorized - token may be expired")]
    TokenExpired,

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("No refresh token available")]
    NoRefreshCredential,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Fallback message when the server gives no usable error text
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Substring the backend uses in every credential-rejection message
const TOKEN_ERROR_MARKER: &str = "token";

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    /// Classify a non-2xx response. Only a 401 whose error text mentions
    /// the token is treated as an expired credential.
    pub fn from_response(status: u16, body: Option<&Value>) -> Self {
        if status == 401 && body.map(mentions_token).unwrap_or(false) {
            return ApiError::TokenExpired;
        }
        Self::request_failed(status, body)
    }

    /// Build a `RequestFailed` without considering the refresh path.
    pub fn request_failed(status: u16, body: Option<&Value>) -> Self {
        let message = body
            .and_then(server_message)
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
        ApiError::RequestFailed { status, message }
    }

    /// True for every error the caller must handle as a forced logout.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::NoRefreshCredential)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RequestFailed { status, .. } => Some(*status),
            ApiError::TokenExpired | ApiError::SessionExpired => Some(401),
            _ => None,
        }
    }
}

fn mentions_token(body: &Value) -> bool {
    ["detail", "error"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .any(|text| text.to_lowercase().contains(TOKEN_ERROR_MARKER))
}

/// Pull the human-readable message out of an error envelope:
/// `detail`, then `error`, then the serializer's field `errors`.
fn server_message(body: &Value) -> Option<String> {
    for field in ["detail", "error"] {
        if let Some(text) = body.get(field).and_then(Value::as_str) {
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }

    let errors = body.get("errors")?.as_object()?;
    let parts: Vec<String> = errors
        .iter()
        .map(|(field, messages)| {
            let text = match messages {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}: {}", field, text)
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
