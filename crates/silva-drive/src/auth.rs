//! OAuth token handling for the storage service.
//!
//! A headless client only consumes a pre-provisioned token cache file:
//! the cached access token is used while valid, refreshed through the
//! token endpoint when expired and refresh credentials are present, and
//! rejected with an authentication error otherwise. No interactive
//! consent flow is attempted.

use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use silva_core::{Error, Result};

/// Tracing target for storage-service auth operations.
pub const TRACING_TARGET: &str = "silva_drive::auth";

/// Token endpoint used when the cache file does not name one.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this window are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Access-token lifetime assumed when the refresh response omits one.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Cached OAuth token as persisted on disk.
///
/// Matches the shape written by the vendor's client libraries, so a
/// token provisioned elsewhere can be dropped in unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// Bearer access token.
    pub token: String,
    /// Long-lived refresh token, if the grant included one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token endpoint to refresh against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    /// OAuth client identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OAuth client secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Access-token expiry. Absent means "assume still valid".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,
}

impl StoredToken {
    /// Returns true if the access token is expired (or expires within
    /// the safety skew) at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expiry {
            Some(expiry) => expiry.as_second() <= now.as_second() + EXPIRY_SKEW_SECS,
            None => false,
        }
    }

    /// Returns true if this token carries everything a refresh needs.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Returns the effective token endpoint.
    pub fn effective_token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// A validated bearer token handed to the client.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expiry: Option<Timestamp>,
}

impl AccessToken {
    /// Returns the bearer secret for the Authorization header.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns the expiry of the token, if known.
    pub fn expiry(&self) -> Option<Timestamp> {
        self.expiry
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// Loads, refreshes, and persists the cached OAuth token.
#[derive(Debug, Clone)]
pub struct DriveAuth {
    token_path: PathBuf,
}

impl DriveAuth {
    /// Creates an authenticator reading from the given token cache file.
    pub fn new(token_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
        }
    }

    /// Returns the path of the token cache file.
    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Produces a usable access token, refreshing and re-persisting the
    /// cache when the stored token has expired.
    ///
    /// # Errors
    ///
    /// `Authentication` when the cache file is missing or unreadable,
    /// or when the token is expired without refresh credentials;
    /// `RemoteCall` when the token endpoint cannot be reached.
    pub async fn authorize(&self, http: &reqwest::Client) -> Result<AccessToken> {
        let stored = self.load().await?;
        let now = Timestamp::now();

        if !stored.is_expired(now) {
            return Ok(AccessToken {
                secret: stored.token,
                expiry: stored.expiry,
            });
        }

        if !stored.can_refresh() {
            return Err(Error::authentication()
                .with_message("access token expired and no refresh credentials are cached"));
        }

        tracing::debug!(
            target: TRACING_TARGET,
            token_uri = stored.effective_token_uri(),
            "refreshing expired access token"
        );

        let refreshed = self.refresh(http, &stored, now).await?;
        self.persist(&refreshed).await?;

        tracing::info!(
            target: TRACING_TARGET,
            expiry = ?refreshed.expiry,
            "access token refreshed"
        );

        Ok(AccessToken {
            secret: refreshed.token,
            expiry: refreshed.expiry,
        })
    }

    /// Reads and decodes the token cache file.
    async fn load(&self) -> Result<StoredToken> {
        let bytes = match tokio::fs::read(&self.token_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::authentication().with_message(format!(
                    "token cache not found at {}",
                    self.token_path.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_slice(&bytes).map_err(|err| {
            Error::authentication()
                .with_message(format!(
                    "malformed token cache at {}",
                    self.token_path.display()
                ))
                .with_source(err)
        })
    }

    /// Exchanges the refresh token for a new access token.
    async fn refresh(
        &self,
        http: &reqwest::Client,
        stored: &StoredToken,
        now: Timestamp,
    ) -> Result<StoredToken> {
        // can_refresh() was checked by the caller.
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", stored.refresh_token.as_deref().unwrap_or_default()),
            ("client_id", stored.client_id.as_deref().unwrap_or_default()),
            ("client_secret", stored.client_secret.as_deref().unwrap_or_default()),
        ];

        let response = http
            .post(stored.effective_token_uri())
            .form(&params)
            .send()
            .await
            .map_err(crate::error::Error::Reqwest)?;

        let status = response.status();
        if status.is_client_error() {
            return Err(Error::authentication().with_message(format!(
                "token endpoint rejected the refresh request with status {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(Error::remote_call().with_message(format!(
                "token endpoint returned status {}",
                status.as_u16()
            )));
        }

        let refresh: RefreshResponse = response
            .json()
            .await
            .map_err(crate::error::Error::Reqwest)?;

        let lifetime = refresh.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let expiry = Timestamp::from_second(now.as_second() + lifetime).ok();

        Ok(StoredToken {
            token: refresh.access_token,
            expiry,
            ..stored.clone()
        })
    }

    /// Writes the refreshed token back to the cache file.
    async fn persist(&self, token: &StoredToken) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(token).map_err(crate::error::Error::Serde)?;
        tokio::fs::write(&self.token_path, bytes).await?;
        Ok(())
    }
}

/// Token endpoint response for a refresh grant.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_json(expiry: &str) -> String {
        format!(
            r#"{{
                "token": "ya29.sample",
                "refresh_token": "1//refresh",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_id": "client.apps.example.com",
                "client_secret": "secret",
                "expiry": "{expiry}"
            }}"#
        )
    }

    #[test]
    fn test_stored_token_decodes_vendor_shape() {
        let token: StoredToken = serde_json::from_str(&token_json("2030-01-01T00:00:00Z")).unwrap();
        assert_eq!(token.token, "ya29.sample");
        assert!(token.can_refresh());
        assert_eq!(token.effective_token_uri(), "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_expiry_skew() {
        let now: Timestamp = "2026-01-01T00:00:00Z".parse().unwrap();
        let mut token: StoredToken = serde_json::from_str(&token_json("2026-01-01T00:00:30Z")).unwrap();
        // 30s ahead is inside the skew window.
        assert!(token.is_expired(now));

        token.expiry = Some("2026-01-01T01:00:00Z".parse().unwrap());
        assert!(!token.is_expired(now));

        token.expiry = None;
        assert!(!token.is_expired(now));
    }

    #[test]
    fn test_refresh_requires_full_credentials() {
        let mut token: StoredToken = serde_json::from_str(&token_json("2020-01-01T00:00:00Z")).unwrap();
        token.client_secret = None;
        assert!(!token.can_refresh());
    }

    #[tokio::test]
    async fn test_missing_cache_is_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let auth = DriveAuth::new(dir.path().join("token.json"));
        let err = auth.load().await.unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn test_persist_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let auth = DriveAuth::new(dir.path().join("token.json"));
        let token: StoredToken = serde_json::from_str(&token_json("2030-01-01T00:00:00Z")).unwrap();

        auth.persist(&token).await.unwrap();
        let loaded = auth.load().await.unwrap();
        assert_eq!(loaded.token, token.token);
        assert_eq!(loaded.expiry, token.expiry);
    }
}
