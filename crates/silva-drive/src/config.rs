//! Configuration for the storage-service client.

use std::path::PathBuf;
use std::time::Duration;

use silva_core::{Error, Result};

/// Default values for client configuration.
pub mod defaults {
    /// Storage service API endpoint.
    pub const ENDPOINT: &str = "https://www.googleapis.com";

    /// OAuth token cache file, relative to the working directory.
    pub const TOKEN_PATH: &str = "token.json";

    /// Page size for file listing calls.
    pub const PAGE_SIZE: u32 = 100;

    /// Request timeout in seconds.
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// Configuration for [`DriveClient`](crate::DriveClient).
#[derive(Debug, Clone)]
pub struct DriveClientConfig {
    /// Base URL of the storage service API.
    pub endpoint: String,
    /// Path to the cached OAuth token file.
    pub token_path: PathBuf,
    /// Page size for listing calls.
    pub page_size: u32,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl Default for DriveClientConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::ENDPOINT.to_owned(),
            token_path: PathBuf::from(defaults::TOKEN_PATH),
            page_size: defaults::PAGE_SIZE,
            timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
        }
    }
}

impl DriveClientConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the storage service API.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the path of the cached OAuth token file.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the page size used by listing calls.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(Error::configuration()
                .with_message(format!("endpoint must be an http(s) URL, got {}", self.endpoint)));
        }
        if self.page_size == 0 {
            return Err(Error::configuration().with_message("page size must be greater than 0"));
        }
        Ok(())
    }

    /// Returns the effective page size, using the default if zero.
    pub fn effective_page_size(&self) -> u32 {
        if self.page_size == 0 {
            defaults::PAGE_SIZE
        } else {
            self.page_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DriveClientConfig::default();
        assert_eq!(config.endpoint, defaults::ENDPOINT);
        assert_eq!(config.page_size, defaults::PAGE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = DriveClientConfig::new().with_endpoint("not-a-url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = DriveClientConfig::new().with_page_size(0);
        assert!(config.validate().is_err());
        assert_eq!(config.effective_page_size(), defaults::PAGE_SIZE);
    }
}
