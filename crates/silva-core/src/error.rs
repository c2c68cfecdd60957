//! Common error type definitions.

use strum::{AsRefStr, IntoStaticStr};
use thiserror::Error as ThisError;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// Used as the source slot of [`Error`] to wrap transport- or
/// decoder-level failures while keeping Send and Sync bounds.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors that can occur while orchestrating the remote
/// imagery and storage services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Credential missing, expired, or rejected. Never retried.
    Authentication,
    /// A named folder or resource required as a hard dependency is absent.
    NotFound,
    /// A remote call failed (transport or API). Propagated without retry.
    RemoteCall,
    /// The service returned a payload that does not match the expected shape.
    Decode,
    /// Configuration error.
    Configuration,
    /// Input validation failed.
    InvalidInput,
    /// Local filesystem error (token cache, key files).
    Io,
}

/// A structured error carrying a kind, an optional message, and an
/// optional source error.
///
/// Remote failures abort the current top-level operation. There is no
/// automatic retry, partial-result reporting, or checkpointing; effects
/// already applied remotely (such as moved files) are not rolled back.
#[derive(Debug, ThisError)]
#[error("{}{}", kind.as_ref(), message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional error message.
    pub message: Option<String>,
    /// Optional source error.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Creates a new authentication error.
    pub fn authentication() -> Self {
        Self::new(ErrorKind::Authentication)
    }

    /// Creates a new not found error.
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a new remote call error.
    pub fn remote_call() -> Self {
        Self::new(ErrorKind::RemoteCall)
    }

    /// Creates a new decode error.
    pub fn decode() -> Self {
        Self::new(ErrorKind::Decode)
    }

    /// Creates a new configuration error.
    pub fn configuration() -> Self {
        Self::new(ErrorKind::Configuration)
    }

    /// Creates a new invalid input error.
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates a new io error.
    pub fn io() -> Self {
        Self::new(ErrorKind::Io)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Returns true if this is an authentication error.
    pub fn is_authentication(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }

    /// Returns true if this is a remote call error.
    pub fn is_remote_call(&self) -> bool {
        self.kind == ErrorKind::RemoteCall
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io().with_message(err.to_string()).with_source(err)
    }
}
