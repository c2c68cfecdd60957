//! Configuration for the imagery-service client.

use std::path::PathBuf;
use std::time::Duration;

use silva_core::{Error, Result};

/// Default values for client configuration.
pub mod defaults {
    /// Imagery service API endpoint.
    pub const ENDPOINT: &str = "https://earthengine.googleapis.com";

    /// OAuth scope requested for service-account sessions.
    pub const SCOPE: &str = "https://www.googleapis.com/auth/earthengine";

    /// Request timeout in seconds.
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
}

/// Configuration for [`EngineClient`](crate::EngineClient).
///
/// A service-account session needs all three of `project`,
/// `service_account`, and `key_path`; without them the client runs
/// unauthenticated (useful only against local test endpoints).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the imagery service API.
    pub endpoint: String,
    /// Cloud project the session is billed against.
    pub project: Option<String>,
    /// Service-account email.
    pub service_account: Option<String>,
    /// Path to the service-account private key file (JSON).
    pub key_path: Option<PathBuf>,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::ENDPOINT.to_owned(),
            project: None,
            service_account: None,
            key_path: None,
            timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the imagery service API.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the cloud project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the service-account email.
    pub fn with_service_account(mut self, account: impl Into<String>) -> Self {
        self.service_account = Some(account.into());
        self
    }

    /// Sets the path of the service-account key file.
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if the configuration names a service account.
    pub fn has_service_account(&self) -> bool {
        self.service_account.is_some() && self.key_path.is_some() && self.project.is_some()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(Error::configuration()
                .with_message(format!("endpoint must be an http(s) URL, got {}", self.endpoint)));
        }
        // A partially-specified service account is a configuration
        // mistake rather than a request for an unauthenticated session.
        let partial = self.service_account.is_some() || self.key_path.is_some();
        if partial && !self.has_service_account() {
            return Err(Error::configuration().with_message(
                "service-account sessions need an account email, a key file, and a project",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.has_service_account());
    }

    #[test]
    fn test_partial_service_account_rejected() {
        let config = EngineConfig::new().with_service_account("svc@example.iam");
        assert!(config.validate().is_err());

        let config = EngineConfig::new()
            .with_service_account("svc@example.iam")
            .with_key_path("/keys/svc.json")
            .with_project("forest-loss");
        assert!(config.validate().is_ok());
        assert!(config.has_service_account());
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let config = EngineConfig::new().with_endpoint("earthengine.googleapis.com");
        assert!(config.validate().is_err());
    }
}
