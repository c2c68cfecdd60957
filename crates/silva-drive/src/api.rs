//! The storage-service operation trait.
//!
//! [`DriveClient`](crate::DriveClient) is the HTTP implementation; the
//! partitioner and its tests only depend on this trait, so an in-memory
//! implementation can stand in for the remote service.

use async_trait::async_trait;
use silva_core::Result;

use crate::types::{FileId, FileListPage, FileRecord, Folder, FolderFilter, FolderId, PageToken};

/// Operations the storage service exposes to the pipeline.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Lists folders matching the filter.
    async fn list_folders(&self, filter: FolderFilter) -> Result<Vec<Folder>>;

    /// Creates a folder, optionally under a parent.
    async fn create_folder(&self, name: &str, parent: Option<&FolderId>) -> Result<Folder>;

    /// Fetches one page of the files directly under a folder.
    async fn list_files(
        &self,
        folder: &FolderId,
        page_size: u32,
        page_token: Option<&PageToken>,
    ) -> Result<FileListPage>;

    /// Fetches the current parent set of a file.
    async fn file_parents(&self, file: &FileId) -> Result<Vec<FolderId>>;

    /// Moves a file: removes all of `known_parents` from its parent set
    /// and adds `dest`.
    ///
    /// When `known_parents` is empty the implementation must first fetch
    /// the file's current parents (one extra round trip), so the file is
    /// never left orphaned or doubly-parented. Adding a parent that is
    /// already present is a service-defined no-op.
    async fn move_file(
        &self,
        file: &FileId,
        dest: &FolderId,
        known_parents: &[FolderId],
    ) -> Result<()>;

    /// Finds a folder by exact name, optionally under a parent.
    async fn find_folder(&self, name: &str, parent: Option<&FolderId>) -> Result<Option<Folder>> {
        let mut filter = FolderFilter::new().with_name(name);
        if let Some(parent) = parent {
            filter = filter.with_parent(parent.clone());
        }

        let folders = self.list_folders(filter).await?;
        Ok(folders.into_iter().find(|folder| folder.name == name))
    }

    /// Fetches every file directly under a folder, draining pagination.
    ///
    /// The loop continues while the service reports the search as
    /// incomplete or hands back a continuation token; a partial listing
    /// is never returned.
    async fn list_all_files(&self, folder: &FolderId, page_size: u32) -> Result<Vec<FileRecord>> {
        let mut files = Vec::new();
        let mut page_token: Option<PageToken> = None;

        loop {
            let page = self
                .list_files(folder, page_size, page_token.as_ref())
                .await?;
            files.extend(page.files);

            if !page.incomplete_search && page.next_page_token.is_none() {
                return Ok(files);
            }
            page_token = page.next_page_token;
        }
    }
}
