// src/error.rs
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures surfaced by the client. None of them are fatal: every component
/// converts them into an empty, recoverable state at its own boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Transport failure or non-2xx response.
    RequestFailed {
        status: Option<u16>,
        message: String,
    },
    /// A stored session record could not be decoded.
    ParseFailed(String),
    /// No valid session.
    Unauthenticated,
    /// Local storage could not be read or written.
    Io(String),
}

impl ClientError {
    pub fn request(message: impl Into<String>) -> Self {
        ClientError::RequestFailed {
            status: None,
            message: message.into(),
        }
    }

    /// Builds the error for a non-2xx response, preferring the body's
    /// `detail` field over the status text.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        ClientError::RequestFailed {
            status: Some(status.as_u16()),
            message: detail_message(status, body),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403)) || *self == ClientError::Unauthenticated
    }
}

fn detail_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());

    match detail {
        Some(Value::String(message)) if !message.is_empty() => message,
        // validation errors arrive as a list of {loc, msg, type}
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                fallback_message(status)
            } else {
                messages.join("; ")
            }
        }
        _ => fallback_message(status),
    }
}

fn fallback_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| "Request failed".to_string())
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::RequestFailed { message, .. } => write!(f, "{}", message),
            ClientError::ParseFailed(message) => write!(f, "stored session is malformed: {}", message),
            ClientError::Unauthenticated => write!(f, "not signed in"),
            ClientError::Io(message) => write!(f, "storage error: {}", message),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::RequestFailed {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::ParseFailed(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e.to_string())
    }
}
