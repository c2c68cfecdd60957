#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod api;
mod auth;
mod client;
mod config;
mod error;
mod partition;
mod types;

pub use api::DriveApi;
pub use auth::{AccessToken, DriveAuth, StoredToken};
pub use client::DriveClient;
pub use config::DriveClientConfig;
pub use partition::{
    PartitionConfig, PartitionSummary, Partitioner, RatioSampler, Split,
};
pub use types::{
    FileId, FileListPage, FileRecord, Folder, FolderFilter, FolderId, PageToken,
};
