//! Internal error types for silva-earthengine.

use reqwest::StatusCode;
use thiserror::Error as ThisError;

/// Maximum response-body length included in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Internal transport-level error, converted into
/// [`silva_core::Error`] at the client boundary.
#[derive(Debug, ThisError)]
pub(crate) enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Payload (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<Error> for silva_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                let message = if e.is_timeout() {
                    "request timed out".to_owned()
                } else if e.is_connect() {
                    "connection failed".to_owned()
                } else {
                    e.to_string()
                };
                silva_core::Error::remote_call()
                    .with_message(message)
                    .with_source(e)
            }
            Error::Serde(e) => silva_core::Error::decode()
                .with_message(e.to_string())
                .with_source(e),
        }
    }
}

/// Maps a non-success HTTP status to the shared error kinds.
pub(crate) fn status_error(status: StatusCode, body: &str) -> silva_core::Error {
    let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => silva_core::Error::authentication()
            .with_message(format!(
                "service rejected credentials with status {}",
                status.as_u16()
            )),
        StatusCode::NOT_FOUND => {
            silva_core::Error::not_found().with_message(format!("resource not found: {snippet}"))
        }
        _ => silva_core::Error::remote_call()
            .with_message(format!("status {}: {snippet}", status.as_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(status_error(StatusCode::UNAUTHORIZED, "").is_authentication());
        assert!(status_error(StatusCode::NOT_FOUND, "").is_not_found());
        assert!(status_error(StatusCode::BAD_GATEWAY, "upstream").is_remote_call());
    }
}
