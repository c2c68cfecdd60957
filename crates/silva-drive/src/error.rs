//! Internal error types for silva-drive.

use thiserror::Error as ThisError;

/// Internal error type for transport-level failures.
///
/// Converted into [`silva_core::Error`] at the client boundary so the
/// public API only ever surfaces the shared error kinds.
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
                if e.is_decode() {
                    silva_core::Error::decode()
                        .with_message(e.to_string())
                        .with_source(e)
                } else if e.is_timeout() {
                    silva_core::Error::remote_call()
                        .with_message("request timed out")
                        .with_source(e)
                } else if e.is_connect() {
                    silva_core::Error::remote_call()
                        .with_message("connection failed")
                        .with_source(e)
                } else {
                    silva_core::Error::remote_call()
                        .with_message(e.to_string())
                        .with_source(e)
                }
            }
            Error::Serde(e) => silva_core::Error::decode()
                .with_message(e.to_string())
                .with_source(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_error_maps_to_decode() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: silva_core::Error = Error::Serde(serde_err).into();
        assert_eq!(err.kind(), silva_core::ErrorKind::Decode);
    }
}
