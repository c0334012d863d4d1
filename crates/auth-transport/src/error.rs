//! Error types for the auth transport.

use serde::Deserialize;
use thiserror::Error;

/// Normalized auth API error.
///
/// Display strings are user-facing; they end up verbatim in the `error`
/// field of the auth state that UI layers render.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 401 on a credential-based call
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// 401 on an OTP call
    #[error("Invalid OTP. Please try again.")]
    InvalidOtp,

    /// 4xx rejection with the server's field messages, in order.
    /// `status` is None when the rejection was produced locally.
    #[error("{}", .messages.join("; "))]
    Validation {
        status: Option<u16>,
        messages: Vec<String>,
    },

    /// The request deadline elapsed
    #[error("Request timed out")]
    Timeout,

    /// 5xx or a connection-level failure
    #[error("Authentication service unavailable")]
    ServiceUnavailable {
        status: Option<u16>,
        detail: String,
    },

    /// Success status with a payload that could not be decoded
    #[error("Invalid response from server")]
    InvalidResponse { detail: String },
}

impl ApiError {
    /// Local validation rejection (no HTTP status).
    pub fn validation(messages: Vec<String>) -> Self {
        Self::Validation {
            status: None,
            messages,
        }
    }

    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self::InvalidResponse {
            detail: detail.into(),
        }
    }
}

/// Result type for transport operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Rejection body as the auth server sends it: `message` is either a
/// single string or an ordered array of field messages.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<MessageField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageField {
    One(String),
    Many(Vec<String>),
}

/// Extracts ordered messages from a rejection body, falling back to a
/// generic text when the body carries none.
pub(crate) fn extract_messages(body: &str, fallback: &str) -> Vec<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        match parsed.message {
            Some(MessageField::One(msg)) if !msg.is_empty() => return vec![msg],
            Some(MessageField::Many(msgs)) if !msgs.is_empty() => return msgs,
            _ => {}
        }
    }
    vec![fallback.to_string()]
}
