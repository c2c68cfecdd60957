//! Randomized test/train dataset partitioning.
//!
//! Splits every file directly under a named parent folder into two
//! child folders with a per-file Bernoulli trial: one independent
//! uniform draw in `[0, 1)` per file, assigned to the test folder iff
//! the draw is below the configured ratio. The realized test fraction
//! therefore only approximates the ratio for finite folders (expected
//! value `r`, variance `r(1-r)/n`); this is not a shuffle-and-split and
//! must not be replaced by one.

use futures::stream::{self, TryStreamExt};
use rand::Rng;
use rand::RngExt;
use silva_core::{Error, Result};

use crate::api::DriveApi;
use crate::types::{FolderId, FolderFilter};

/// Tracing target for partition runs.
pub const TRACING_TARGET: &str = "silva_drive::partition";

/// Default values for partition configuration.
pub mod defaults {
    /// Name of the test folder created under the parent.
    pub const TEST_FOLDER: &str = "test";

    /// Name of the train folder created under the parent.
    pub const TRAIN_FOLDER: &str = "train";

    /// Probability of assigning a file to the test folder.
    pub const TEST_RATIO: f64 = 0.2;

    /// Page size for the listing drain.
    pub const PAGE_SIZE: u32 = 100;

    /// Number of moves in flight at once.
    pub const MOVE_CONCURRENCY: usize = 1;
}

/// Uniform draw source for assignment trials.
///
/// Implemented for every [`rand::Rng`]; tests inject fixed sequences
/// through their own implementations.
pub trait RatioSampler {
    /// Draws one uniform sample in `[0, 1)`.
    fn sample(&mut self) -> f64;
}

impl<R: Rng> RatioSampler for R {
    fn sample(&mut self) -> f64 {
        self.random()
    }
}

/// Which side of the split a file was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// Assigned to the test folder.
    Test,
    /// Assigned to the train folder.
    Train,
}

/// Configuration for a partition run.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// Name of the test folder under the parent.
    pub test_name: String,
    /// Name of the train folder under the parent.
    pub train_name: String,
    /// Probability of assigning a file to the test folder, in `[0, 1]`.
    pub test_ratio: f64,
    /// Page size for the listing drain.
    pub page_size: u32,
    /// Bound on concurrent move calls. 1 keeps moves fully sequential.
    pub move_concurrency: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            test_name: defaults::TEST_FOLDER.to_owned(),
            train_name: defaults::TRAIN_FOLDER.to_owned(),
            test_ratio: defaults::TEST_RATIO,
            page_size: defaults::PAGE_SIZE,
            move_concurrency: defaults::MOVE_CONCURRENCY,
        }
    }
}

impl PartitionConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the test folder name.
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = name.into();
        self
    }

    /// Sets the train folder name.
    pub fn with_train_name(mut self, name: impl Into<String>) -> Self {
        self.train_name = name.into();
        self
    }

    /// Sets the test assignment probability.
    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    /// Sets the listing page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the bound on concurrent move calls.
    pub fn with_move_concurrency(mut self, concurrency: usize) -> Self {
        self.move_concurrency = concurrency;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.test_ratio) {
            return Err(Error::invalid_input()
                .with_message(format!("test ratio must be in [0, 1], got {}", self.test_ratio)));
        }
        if self.test_name.is_empty() || self.train_name.is_empty() {
            return Err(Error::invalid_input().with_message("split folder names must be non-empty"));
        }
        if self.test_name == self.train_name {
            return Err(Error::invalid_input()
                .with_message("test and train folders must have distinct names"));
        }
        if self.page_size == 0 {
            return Err(Error::invalid_input().with_message("page size must be greater than 0"));
        }
        if self.move_concurrency == 0 {
            return Err(Error::invalid_input()
                .with_message("move concurrency must be greater than 0"));
        }
        Ok(())
    }
}

/// Outcome of a completed partition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionSummary {
    /// Files moved into the test folder.
    pub moved_to_test: usize,
    /// Files moved into the train folder.
    pub moved_to_train: usize,
}

impl PartitionSummary {
    /// Total files moved.
    pub fn total(&self) -> usize {
        self.moved_to_test + self.moved_to_train
    }
}

/// Partitions the files under a parent folder into test and train.
///
/// Any remote failure aborts the remaining run: files already moved stay
/// in their new location and nothing is retried or rolled back.
pub struct Partitioner<'a, A: DriveApi + ?Sized> {
    api: &'a A,
    config: PartitionConfig,
}

impl<'a, A: DriveApi + ?Sized> Partitioner<'a, A> {
    /// Creates a partitioner over the given storage API.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the configuration does not validate.
    pub fn new(api: &'a A, config: PartitionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { api, config })
    }

    /// Runs the partition under the named parent folder.
    ///
    /// Resolves the parent, ensures both split folders exist (creating
    /// them at most once per run), drains the full file listing, draws
    /// one assignment per file in listing order, then issues the moves.
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent folder does not exist; any error from
    /// a remote call aborts the remainder of the run.
    pub async fn run(
        &self,
        parent_name: &str,
        sampler: &mut dyn RatioSampler,
    ) -> Result<PartitionSummary> {
        let parent = self
            .api
            .find_folder(parent_name, None)
            .await?
            .ok_or_else(|| {
                Error::not_found().with_message(format!("parent folder '{parent_name}' not found"))
            })?;

        // Each split folder is resolved exactly once per run; created
        // folders are never re-listed.
        let test_id = self
            .resolve_or_create_folder(&self.config.test_name, &parent.id)
            .await?;
        let train_id = self
            .resolve_or_create_folder(&self.config.train_name, &parent.id)
            .await?;

        let files = self
            .api
            .list_all_files(&parent.id, self.config.page_size)
            .await?;

        tracing::info!(
            target: TRACING_TARGET,
            parent = %parent_name,
            files = files.len(),
            test_ratio = self.config.test_ratio,
            "partitioning folder"
        );

        // Draws happen sequentially in listing order so each file's
        // trial is independent of how the moves later interleave.
        let mut summary = PartitionSummary::default();
        let assignments: Vec<_> = files
            .into_iter()
            .map(|file| {
                let split = if sampler.sample() < self.config.test_ratio {
                    summary.moved_to_test += 1;
                    Split::Test
                } else {
                    summary.moved_to_train += 1;
                    Split::Train
                };
                (file, split)
            })
            .collect();

        let api = self.api;
        let test_id = &test_id;
        let train_id = &train_id;
        stream::iter(assignments.iter().map(Ok::<_, Error>))
            .try_for_each_concurrent(Some(self.config.move_concurrency), |(file, split)| {
                let dest = match split {
                    Split::Test => test_id,
                    Split::Train => train_id,
                };
                async move {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        file = %file.id,
                        split = ?split,
                        "moving file"
                    );
                    api.move_file(&file.id, dest, &file.parents).await
                }
            })
            .await?;

        tracing::info!(
            target: TRACING_TARGET,
            moved_to_test = summary.moved_to_test,
            moved_to_train = summary.moved_to_train,
            "partition complete"
        );

        Ok(summary)
    }

    /// Looks a folder up by name under the parent, creating it when
    /// absent. Calling this twice for the same name returns the same
    /// handle and creates no duplicate.
    async fn resolve_or_create_folder(&self, name: &str, parent: &FolderId) -> Result<FolderId> {
        let existing = self
            .api
            .list_folders(
                FolderFilter::new()
                    .with_name(name)
                    .with_parent(parent.clone()),
            )
            .await?;

        if let Some(folder) = existing.into_iter().find(|folder| folder.name == name) {
            return Ok(folder.id);
        }

        let created = self.api.create_folder(name, Some(parent)).await?;
        Ok(created.id)
    }
}
