//! Typed records decoded at the storage-service boundary.
//!
//! The service itself only speaks in opaque identifiers and JSON
//! resources; everything here is an immutable snapshot of what a single
//! remote call returned.

use serde::{Deserialize, Serialize};

/// Opaque folder identifier issued by the storage service.
///
/// Not meaningful outside the service; owned by it and cached only
/// transiently during a single run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub String);

impl FolderId {
    /// Returns the raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FolderId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque file identifier issued by the storage service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Returns the raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque pagination continuation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(pub String);

impl PageToken {
    /// Returns the raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A folder as returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Identifier of the folder.
    pub id: FolderId,
    /// Display name of the folder.
    pub name: String,
}

/// A file snapshot from a listing call.
///
/// `parents` is the parent set at listing time and is what a subsequent
/// move removes; the snapshot is never refreshed in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Identifier of the file.
    pub id: FileId,
    /// Display name of the file.
    pub name: String,
    /// Parent folders at the time of the listing, in service order.
    pub parents: Vec<FolderId>,
}

/// One page of a file listing.
///
/// The listing is exhausted only when `incomplete_search` is false and
/// `next_page_token` is absent. No ordering is guaranteed across pages
/// beyond "union of all pages = full file set".
#[derive(Debug, Clone, Default)]
pub struct FileListPage {
    /// Files on this page.
    pub files: Vec<FileRecord>,
    /// Continuation token for the next page, if any.
    pub next_page_token: Option<PageToken>,
    /// Whether the service reports this listing pass as incomplete.
    pub incomplete_search: bool,
}

/// Filter for folder listing calls.
#[derive(Debug, Clone, Default)]
pub struct FolderFilter {
    /// Restrict to folders with this exact name.
    pub name: Option<String>,
    /// Restrict to folders directly under this parent.
    pub parent: Option<FolderId>,
}

impl FolderFilter {
    /// Creates an empty filter matching every folder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to an exact folder name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the filter to children of the given parent.
    pub fn with_parent(mut self, parent: FolderId) -> Self {
        self.parent = Some(parent);
        self
    }
}
