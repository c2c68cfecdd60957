//! HTTP implementation of the storage-service client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use silva_core::{Error, Result};

use crate::api::DriveApi;
use crate::auth::{AccessToken, DriveAuth};
use crate::config::DriveClientConfig;
use crate::types::{FileId, FileListPage, FileRecord, Folder, FolderFilter, FolderId, PageToken};

/// Tracing target for storage client operations.
pub const TRACING_TARGET: &str = "silva_drive::client";

/// MIME type the service uses to mark folders.
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested on file listing calls.
const FILE_LIST_FIELDS: &str = "nextPageToken, incompleteSearch, files(id, name, parents)";

/// Fields requested on folder listing calls.
const FOLDER_LIST_FIELDS: &str = "nextPageToken, files(id, name)";

/// Maximum response-body length included in error messages.
const ERROR_BODY_LIMIT: usize = 200;

struct DriveClientInner {
    http: Client,
    config: DriveClientConfig,
    token: AccessToken,
}

impl std::fmt::Debug for DriveClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClientInner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Typed client for the storage service.
///
/// Constructed once and passed by reference to every operation; there is
/// no ambient credential state. Cloning is cheap and shares the inner
/// HTTP client and token.
#[derive(Clone, Debug)]
pub struct DriveClient {
    inner: Arc<DriveClientInner>,
}

impl DriveClient {
    /// Connects to the storage service using the cached OAuth token
    /// named by the configuration.
    ///
    /// # Errors
    ///
    /// `Configuration` when the configuration is invalid,
    /// `Authentication` when no usable token can be produced.
    pub async fn connect(config: DriveClientConfig) -> Result<Self> {
        config.validate()?;

        let http = build_http(&config)?;
        let auth = DriveAuth::new(&config.token_path);
        let token = auth.authorize(&http).await?;

        tracing::info!(
            target: TRACING_TARGET,
            endpoint = %config.endpoint,
            "storage client connected"
        );

        Ok(Self {
            inner: Arc::new(DriveClientInner {
                http,
                config,
                token,
            }),
        })
    }

    /// Creates a client from an already-validated access token.
    pub fn with_token(config: DriveClientConfig, token: AccessToken) -> Result<Self> {
        config.validate()?;
        let http = build_http(&config)?;

        Ok(Self {
            inner: Arc::new(DriveClientInner {
                http,
                config,
                token,
            }),
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &DriveClientConfig {
        &self.inner.config
    }

    /// Default page size for listing calls made through this client.
    pub fn page_size(&self) -> u32 {
        self.inner.config.effective_page_size()
    }

    fn files_url(&self) -> String {
        format!(
            "{}/drive/v3/files",
            self.inner.config.endpoint.trim_end_matches('/')
        )
    }

    fn file_url(&self, id: &FileId) -> String {
        format!("{}/{}", self.files_url(), id)
    }

    /// Sends the request, maps non-success statuses to error kinds, and
    /// decodes the JSON body.
    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(self.inner.token.secret())
            .send()
            .await
            .map_err(crate::error::Error::Reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(crate::error::Error::Reqwest)?;
        let decoded = serde_json::from_str(&body).map_err(crate::error::Error::Serde)?;
        Ok(decoded)
    }
}

/// Builds the underlying HTTP client.
fn build_http(config: &DriveClientConfig) -> Result<Client> {
    let http = Client::builder()
        .timeout(config.timeout)
        .user_agent(format!("silva/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(crate::error::Error::Reqwest)?;
    Ok(http)
}

/// Maps a non-success HTTP status to the shared error kinds.
fn status_error(status: StatusCode, body: &str) -> Error {
    let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::authentication()
            .with_message(format!(
                "service rejected credentials with status {}",
                status.as_u16()
            )),
        StatusCode::NOT_FOUND => {
            Error::not_found().with_message(format!("resource not found: {snippet}"))
        }
        _ => Error::remote_call().with_message(format!("status {}: {snippet}", status.as_u16())),
    }
}

/// Backslash-escapes a value for use inside a single-quoted query term.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds the search query for a folder listing.
fn folder_query(filter: &FolderFilter) -> String {
    let mut query = format!("mimeType='{FOLDER_MIME_TYPE}'");
    if let Some(name) = &filter.name {
        query.push_str(&format!(" and name='{}'", escape_query(name)));
    }
    if let Some(parent) = &filter.parent {
        query.push_str(&format!(" and '{}' in parents", escape_query(parent.as_str())));
    }
    query
}

/// Builds the search query for the files directly under a folder.
fn files_query(folder: &FolderId) -> String {
    format!(
        "mimeType!='{FOLDER_MIME_TYPE}' and '{}' in parents",
        escape_query(folder.as_str())
    )
}

/// File resource as returned by the service.
#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
    name: String,
    #[serde(default)]
    parents: Vec<String>,
}

impl From<FileResource> for FileRecord {
    fn from(resource: FileResource) -> Self {
        Self {
            id: FileId(resource.id),
            name: resource.name,
            parents: resource.parents.into_iter().map(FolderId).collect(),
        }
    }
}

impl From<FileResource> for Folder {
    fn from(resource: FileResource) -> Self {
        Self {
            id: FolderId(resource.id),
            name: resource.name,
        }
    }
}

/// Listing response page as returned by the service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResource {
    #[serde(default)]
    files: Vec<FileResource>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    incomplete_search: bool,
}

impl From<FileListResource> for FileListPage {
    fn from(resource: FileListResource) -> Self {
        Self {
            files: resource.files.into_iter().map(FileRecord::from).collect(),
            next_page_token: resource.next_page_token.map(PageToken),
            incomplete_search: resource.incomplete_search,
        }
    }
}

/// Parent-set response for a single file.
#[derive(Debug, Deserialize)]
struct ParentsResource {
    #[serde(default)]
    parents: Vec<String>,
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn list_folders(&self, filter: FolderFilter) -> Result<Vec<Folder>> {
        let query = folder_query(&filter);
        tracing::debug!(target: TRACING_TARGET, query = %query, "listing folders");

        let request = self.inner.http.get(self.files_url()).query(&[
            ("q", query.as_str()),
            ("pageSize", "100"),
            ("fields", FOLDER_LIST_FIELDS),
        ]);

        let listing: FileListResource = self.execute(request).await?;
        Ok(listing.files.into_iter().map(Folder::from).collect())
    }

    async fn create_folder(&self, name: &str, parent: Option<&FolderId>) -> Result<Folder> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent) = parent {
            metadata["parents"] = serde_json::json!([parent.as_str()]);
        }

        let request = self
            .inner
            .http
            .post(self.files_url())
            .query(&[("fields", "id, name")])
            .json(&metadata);

        let resource: FileResource = self.execute(request).await?;
        let folder = Folder::from(resource);

        tracing::info!(
            target: TRACING_TARGET,
            folder = %name,
            id = %folder.id,
            "created folder"
        );

        Ok(folder)
    }

    async fn list_files(
        &self,
        folder: &FolderId,
        page_size: u32,
        page_token: Option<&PageToken>,
    ) -> Result<FileListPage> {
        let query = files_query(folder);
        let page_size = page_size.to_string();

        let mut params = vec![
            ("q", query.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", FILE_LIST_FIELDS),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.as_str()));
        }

        tracing::debug!(
            target: TRACING_TARGET,
            folder = %folder,
            continuation = page_token.is_some(),
            "listing files"
        );

        let request = self.inner.http.get(self.files_url()).query(&params);
        let listing: FileListResource = self.execute(request).await?;
        Ok(FileListPage::from(listing))
    }

    async fn file_parents(&self, file: &FileId) -> Result<Vec<FolderId>> {
        let request = self
            .inner
            .http
            .get(self.file_url(file))
            .query(&[("fields", "parents")]);

        let resource: ParentsResource = self.execute(request).await?;
        Ok(resource.parents.into_iter().map(FolderId).collect())
    }

    async fn move_file(
        &self,
        file: &FileId,
        dest: &FolderId,
        known_parents: &[FolderId],
    ) -> Result<()> {
        // The move contract needs the current parent set; fall back to
        // one extra round trip when the caller has no snapshot.
        let previous = if known_parents.is_empty() {
            self.file_parents(file).await?
        } else {
            known_parents.to_vec()
        };

        let remove_parents = previous
            .iter()
            .map(FolderId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        tracing::debug!(
            target: TRACING_TARGET,
            file = %file,
            dest = %dest,
            removed = previous.len(),
            "moving file"
        );

        let request = self
            .inner
            .http
            .patch(self.file_url(file))
            .query(&[
                ("addParents", dest.as_str()),
                ("removeParents", remove_parents.as_str()),
                ("fields", "id, parents"),
            ])
            .json(&serde_json::json!({}));

        let _resource: ParentsResource = self.execute(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("plain"), "plain");
        assert_eq!(escape_query("it's"), "it\\'s");
        assert_eq!(escape_query("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_folder_query_shapes() {
        let all = folder_query(&FolderFilter::new());
        assert_eq!(all, "mimeType='application/vnd.google-apps.folder'");

        let named = folder_query(&FolderFilter::new().with_name("HansenSamples"));
        assert!(named.ends_with("and name='HansenSamples'"));

        let scoped = folder_query(
            &FolderFilter::new()
                .with_name("test")
                .with_parent(FolderId::from("abc123")),
        );
        assert!(scoped.contains("name='test'"));
        assert!(scoped.ends_with("'abc123' in parents"));
    }

    #[test]
    fn test_files_query_excludes_folders() {
        let query = files_query(&FolderId::from("parent1"));
        assert!(query.starts_with("mimeType!="));
        assert!(query.ends_with("'parent1' in parents"));
    }

    #[test]
    fn test_listing_decodes_vendor_payload() {
        let body = r#"{
            "nextPageToken": "tok-2",
            "incompleteSearch": true,
            "files": [
                {"id": "f1", "name": "tile_0.tif", "parents": ["p1"]},
                {"id": "f2", "name": "tile_1.tif"}
            ]
        }"#;

        let page: FileListPage = serde_json::from_str::<FileListResource>(body).unwrap().into();
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.files[0].parents, vec![FolderId::from("p1")]);
        assert!(page.files[1].parents.is_empty());
        assert_eq!(page.next_page_token, Some(PageToken("tok-2".to_owned())));
        assert!(page.incomplete_search);
    }

    #[test]
    fn test_listing_defaults_when_fields_absent() {
        let page: FileListPage = serde_json::from_str::<FileListResource>("{}").unwrap().into();
        assert!(page.files.is_empty());
        assert!(page.next_page_token.is_none());
        assert!(!page.incomplete_search);
    }

    #[test]
    fn test_malformed_resource_rejected() {
        // A file without an id does not decode.
        let body = r#"{"files": [{"name": "orphan.tif"}]}"#;
        assert!(serde_json::from_str::<FileListResource>(body).is_err());
    }

    #[test]
    fn test_status_mapping() {
        assert!(status_error(StatusCode::UNAUTHORIZED, "").is_authentication());
        assert!(status_error(StatusCode::FORBIDDEN, "").is_authentication());
        assert!(status_error(StatusCode::NOT_FOUND, "").is_not_found());
        assert!(status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom").is_remote_call());
    }
}
