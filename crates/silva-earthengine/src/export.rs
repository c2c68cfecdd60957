//! Image export and asynchronous task polling.
//!
//! Exports are remote operations: the service returns an operation
//! handle immediately and the raster lands in the file-storage service
//! when the operation completes. [`ExportTask`] owns the handle and
//! polls it; a failed poll propagates like any other remote failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use silva_core::Result;

use crate::client::EngineClient;
use crate::expression::Geometry;

/// Tracing target for export operations.
pub const TRACING_TARGET: &str = "silva_earthengine::export";

/// Default values for export parameters.
pub mod defaults {
    /// Pixel budget the service enforces per export.
    pub const MAX_PIXELS: u64 = 10_000_000_000_000;

    /// Tile edge length of exported files, in pixels.
    pub const FILE_DIMENSIONS: u32 = 512;

    /// Export projection.
    pub const CRS: &str = "EPSG:4326";

    /// Export resolution in meters per pixel.
    pub const SCALE: u32 = 10;
}

/// Output file format for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileFormat {
    /// Cloud-optimized GeoTIFF tiles.
    #[serde(rename = "GEO_TIFF")]
    GeoTiff,
}

/// Parameters for a drive-destination image export.
#[derive(Debug, Clone)]
pub struct ExportParams {
    /// Task description; also the exported filename prefix.
    pub description: String,
    /// Destination folder in the file-storage service.
    pub folder: String,
    /// Region to export.
    pub region: Geometry,
    /// Resolution in meters per pixel.
    pub scale: u32,
    /// Projection of the exported raster.
    pub crs: String,
    /// Pixel budget for the export.
    pub max_pixels: u64,
    /// Whether fully-masked tiles are skipped.
    pub skip_empty_tiles: bool,
    /// Output file format.
    pub file_format: FileFormat,
    /// Tile edge length of exported files, in pixels.
    pub file_dimensions: u32,
}

impl ExportParams {
    /// Creates export parameters with default scale, projection, and
    /// tiling options.
    pub fn new(
        description: impl Into<String>,
        folder: impl Into<String>,
        region: Geometry,
    ) -> Self {
        Self {
            description: description.into(),
            folder: folder.into(),
            region,
            scale: defaults::SCALE,
            crs: defaults::CRS.to_owned(),
            max_pixels: defaults::MAX_PIXELS,
            skip_empty_tiles: true,
            file_format: FileFormat::GeoTiff,
            file_dimensions: defaults::FILE_DIMENSIONS,
        }
    }

    /// Sets the export resolution in meters per pixel.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the export projection.
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = crs.into();
        self
    }

    /// Sets the pixel budget for the export.
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Conventional description for a yearly difference export.
    pub fn diff_description(year: i32, scale: u32) -> String {
        format!("diff_{year}_{scale}")
    }
}

/// State of an export operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not yet started.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed {
        /// Failure message reported by the service.
        message: String,
    },
    /// Cancelled before completion.
    Cancelled,
}

impl TaskStatus {
    /// Returns true once the operation can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. } | Self::Cancelled)
    }

    /// Returns true while the operation is still pending or running.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub(crate) fn from_operation(operation: &Operation) -> Self {
        if let Some(error) = &operation.error {
            return Self::Failed {
                message: error.message.clone(),
            };
        }

        match operation
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.state.as_deref())
        {
            Some("PENDING") | Some("READY") => Self::Pending,
            Some("RUNNING") => Self::Running,
            Some("SUCCEEDED") | Some("COMPLETED") => Self::Completed,
            Some("FAILED") => Self::Failed {
                message: String::new(),
            },
            Some("CANCELLED") | Some("CANCELLING") => Self::Cancelled,
            _ if operation.done => Self::Completed,
            _ => Self::Pending,
        }
    }
}

/// Operation resource as returned by the service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub metadata: Option<OperationMetadata>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OperationMetadata {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperationError {
    #[serde(default)]
    pub message: String,
}

/// Handle to a started export operation.
#[derive(Debug, Clone)]
pub struct ExportTask {
    client: EngineClient,
    name: String,
}

impl ExportTask {
    pub(crate) fn new(client: EngineClient, name: String) -> Self {
        Self { client, name }
    }

    /// Returns the operation name issued by the service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Polls the operation once.
    pub async fn status(&self) -> Result<TaskStatus> {
        let operation = self.client.operation(&self.name).await?;
        Ok(TaskStatus::from_operation(&operation))
    }

    /// Returns true while the operation is still pending or running.
    pub async fn active(&self) -> Result<bool> {
        Ok(self.status().await?.is_active())
    }

    /// Polls until the operation reaches a terminal state.
    ///
    /// A poll failure aborts the wait; the operation itself keeps
    /// running remotely.
    pub async fn wait_until_done(&self, poll_interval: Duration) -> Result<TaskStatus> {
        loop {
            let status = self.status().await?;
            if status.is_terminal() {
                tracing::info!(
                    target: TRACING_TARGET,
                    task = %self.name,
                    status = ?status,
                    "export finished"
                );
                return Ok(status);
            }

            tracing::debug!(
                target: TRACING_TARGET,
                task = %self.name,
                status = ?status,
                "export still active"
            );
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(body: &str) -> Operation {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_status_from_states() {
        let running = operation(
            r#"{"name": "projects/p/operations/1", "metadata": {"state": "RUNNING"}}"#,
        );
        assert_eq!(TaskStatus::from_operation(&running), TaskStatus::Running);
        assert!(TaskStatus::from_operation(&running).is_active());

        let pending = operation(r#"{"name": "projects/p/operations/1"}"#);
        assert_eq!(TaskStatus::from_operation(&pending), TaskStatus::Pending);

        let completed = operation(
            r#"{"name": "projects/p/operations/1", "done": true, "metadata": {"state": "SUCCEEDED"}}"#,
        );
        assert_eq!(TaskStatus::from_operation(&completed), TaskStatus::Completed);
        assert!(TaskStatus::from_operation(&completed).is_terminal());
    }

    #[test]
    fn test_error_wins_over_state() {
        let failed = operation(
            r#"{
                "name": "projects/p/operations/1",
                "done": true,
                "metadata": {"state": "RUNNING"},
                "error": {"message": "pixel budget exceeded"}
            }"#,
        );
        assert_eq!(
            TaskStatus::from_operation(&failed),
            TaskStatus::Failed {
                message: "pixel budget exceeded".to_owned()
            }
        );
    }

    #[test]
    fn test_done_without_state_is_completed() {
        let done = operation(r#"{"name": "projects/p/operations/1", "done": true}"#);
        assert_eq!(TaskStatus::from_operation(&done), TaskStatus::Completed);
    }

    #[test]
    fn test_params_defaults_match_export_contract() {
        let region = Geometry::polygon(&[vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]);
        let params = ExportParams::new("diff_2019_10", "exampleHansenOutputs", region);

        assert_eq!(params.max_pixels, 10_000_000_000_000);
        assert_eq!(params.file_dimensions, 512);
        assert!(params.skip_empty_tiles);
        assert_eq!(params.file_format, FileFormat::GeoTiff);
        assert_eq!(params.crs, "EPSG:4326");
    }

    #[test]
    fn test_diff_description() {
        assert_eq!(ExportParams::diff_description(2019, 10), "diff_2019_10");
    }
}
