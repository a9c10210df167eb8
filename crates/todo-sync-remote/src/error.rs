//! Error types for backend calls.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use todo_sync_core::TaskId;

const MAX_MESSAGE_LEN: usize = 240;

/// Errors that can occur talking to the backend.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport failure, timeout, or an unreadable response body.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Summary of the error body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A write matched no row (deleted elsewhere or not visible to this user).
    #[error("no row returned for task {0}")]
    MissingRow(TaskId),

    /// An insert answered with an empty representation.
    #[error("insert returned no row")]
    EmptyInsert,

    /// A data call was attempted without an access token.
    #[error("not signed in")]
    NotSignedIn,

    /// Client construction failed.
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// Build a [`RemoteError::Status`] from a response body.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        Self::Status {
            status,
            message: summarize_body(body),
        }
    }

    /// True when the backend rejected the credentials or token.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            Self::NotSignedIn => true,
            _ => false,
        }
    }
}

/// Error payloads of the REST and auth endpoints share no schema; any of
/// these fields may carry the message.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

fn summarize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response".to_owned();
    }
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(trimmed) else {
        return truncate(trimmed);
    };
    let Some(summary) = parsed
        .message
        .or(parsed.error_description)
        .or(parsed.msg)
        .or(parsed.error)
    else {
        return truncate(trimmed);
    };
    match parsed.hint {
        Some(hint) if !hint.is_empty() => truncate(&format!("{summary} ({hint})")),
        _ => truncate(&summary),
    }
}

fn truncate(message: &str) -> String {
    let mut out = message.replace(['\n', '\r'], " ");
    if out.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgrest_body_uses_message_and_hint() {
        let err = RemoteError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"code":"23502","message":"null value in column \"text\"","details":null,"hint":"check input"}"#,
        );
        assert_eq!(err.to_string(), "HTTP 400 Bad Request: null value in column \"text\" (check input)");
    }

    #[test]
    fn auth_body_prefers_description() {
        let err = RemoteError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.to_string(), "HTTP 400 Bad Request: Invalid login credentials");
    }

    #[test]
    fn plain_bodies_are_flattened_and_truncated() {
        let long = "x\n".repeat(300);
        let err = RemoteError::from_response(StatusCode::BAD_GATEWAY, &long);
        let RemoteError::Status { message, .. } = err else {
            panic!("status error expected");
        };
        assert!(!message.contains('\n'));
        assert!(message.ends_with("..."));
        assert_eq!(message.len(), MAX_MESSAGE_LEN + 3);

        let empty = RemoteError::from_response(StatusCode::BAD_GATEWAY, "  ");
        assert_eq!(empty.to_string(), "HTTP 502 Bad Gateway: empty response");
    }

    #[test]
    fn unauthorized_statuses_are_detected() {
        assert!(RemoteError::from_response(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(RemoteError::NotSignedIn.is_unauthorized());
        assert!(!RemoteError::MissingRow(TaskId(1)).is_unauthorized());
    }
}
