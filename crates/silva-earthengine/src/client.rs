//! HTTP implementation of the imagery-service client.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use silva_core::{Error, Result};

use crate::auth::{AccessToken, EngineCredentials, ServiceAccountKey};
use crate::config::EngineConfig;
use crate::error::status_error;
use crate::export::{ExportParams, ExportTask, FileFormat, Operation};
use crate::expression::{Expr, Image};

/// Tracing target for imagery client operations.
pub const TRACING_TARGET: &str = "silva_earthengine::client";

struct EngineClientInner {
    http: Client,
    config: EngineConfig,
    token: Option<AccessToken>,
}

impl std::fmt::Debug for EngineClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClientInner")
            .field("config", &self.config)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

/// Session object for the imagery service.
///
/// Constructed once per run and passed by reference; credential state
/// lives here rather than in any ambient global. Cloning shares the
/// inner HTTP client and token.
#[derive(Clone, Debug)]
pub struct EngineClient {
    inner: Arc<EngineClientInner>,
}

impl EngineClient {
    /// Initializes a session against the configured endpoint.
    ///
    /// Resolves credentials the way the pipeline has always done it: a
    /// fully-specified service account wins, anything else runs
    /// unauthenticated.
    ///
    /// # Errors
    ///
    /// `Configuration` when the configuration is invalid,
    /// `Authentication` when the service-account exchange fails.
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("silva/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(crate::error::Error::Reqwest)?;

        let credentials = resolve_credentials(&config).await?;
        let token = credentials.authorize(&http).await?;

        tracing::info!(
            target: TRACING_TARGET,
            endpoint = %config.endpoint,
            project = config.project.as_deref().unwrap_or("<none>"),
            "imagery session initialized"
        );

        Ok(Self {
            inner: Arc::new(EngineClientInner {
                http,
                config,
                token,
            }),
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Starts an export of the image to the file-storage service.
    ///
    /// Returns immediately with a task handle; the raster materializes
    /// in the destination folder when the remote operation completes.
    pub async fn export_image_to_drive(
        &self,
        image: &Image,
        params: &ExportParams,
    ) -> Result<ExportTask> {
        let project = self.inner.config.project.as_deref().ok_or_else(|| {
            Error::configuration().with_message("image export requires a project")
        })?;

        let url = format!(
            "{}/v1/projects/{}/image:export",
            self.inner.config.endpoint.trim_end_matches('/'),
            project
        );

        let request = ExportImageRequest {
            expression: image.expr(),
            description: &params.description,
            file_export_options: FileExportOptions {
                file_format: params.file_format,
                drive_destination: DriveDestination {
                    folder: &params.folder,
                    filename_prefix: &params.description,
                },
                geo_tiff_options: GeoTiffOptions {
                    skip_empty_files: params.skip_empty_tiles,
                    file_dimensions: params.file_dimensions,
                },
            },
            max_pixels: params.max_pixels,
            grid: Grid {
                crs_code: &params.crs,
                scale: params.scale,
            },
            region: params.region.expr(),
        };

        tracing::debug!(
            target: TRACING_TARGET,
            description = %params.description,
            folder = %params.folder,
            scale = params.scale,
            "submitting image export"
        );

        let operation: Operation = self
            .execute(self.inner.http.post(url).json(&request))
            .await?;

        tracing::info!(
            target: TRACING_TARGET,
            task = %operation.name,
            "export started"
        );

        Ok(ExportTask::new(self.clone(), operation.name))
    }

    /// Fetches the current state of an operation.
    pub(crate) async fn operation(&self, name: &str) -> Result<Operation> {
        let url = format!(
            "{}/v1/{}",
            self.inner.config.endpoint.trim_end_matches('/'),
            name
        );
        self.execute(self.inner.http.get(url)).await
    }

    /// Sends the request with the session's credentials, maps
    /// non-success statuses, and decodes the JSON body.
    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let request = match &self.inner.token {
            Some(token) => request.bearer_auth(token.secret()),
            None => request,
        };

        let response = request.send().await.map_err(crate::error::Error::Reqwest)?;

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

/// Builds session credentials from the configuration.
async fn resolve_credentials(config: &EngineConfig) -> Result<EngineCredentials> {
    match (&config.service_account, &config.key_path) {
        (Some(account), Some(key_path)) => {
            let key = ServiceAccountKey::from_file(key_path).await?;
            Ok(EngineCredentials::ServiceAccount {
                account: account.clone(),
                key,
            })
        }
        _ => Ok(EngineCredentials::None),
    }
}

/// Export request body, in the vendor's shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportImageRequest<'a> {
    expression: &'a Expr,
    description: &'a str,
    file_export_options: FileExportOptions<'a>,
    max_pixels: u64,
    grid: Grid<'a>,
    region: &'a Expr,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileExportOptions<'a> {
    file_format: FileFormat,
    drive_destination: DriveDestination<'a>,
    geo_tiff_options: GeoTiffOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DriveDestination<'a> {
    folder: &'a str,
    filename_prefix: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeoTiffOptions {
    skip_empty_files: bool,
    file_dimensions: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Grid<'a> {
    crs_code: &'a str,
    scale: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Geometry;

    #[test]
    fn test_export_request_shape() {
        let region = Geometry::polygon(&[vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]);
        let params = ExportParams::new("diff_2019_10", "exampleHansenOutputs", region)
            .with_scale(10)
            .with_crs("EPSG:4326");
        let image = Image::asset("some/asset");

        let request = ExportImageRequest {
            expression: image.expr(),
            description: &params.description,
            file_export_options: FileExportOptions {
                file_format: params.file_format,
                drive_destination: DriveDestination {
                    folder: &params.folder,
                    filename_prefix: &params.description,
                },
                geo_tiff_options: GeoTiffOptions {
                    skip_empty_files: params.skip_empty_tiles,
                    file_dimensions: params.file_dimensions,
                },
            },
            max_pixels: params.max_pixels,
            grid: Grid {
                crs_code: &params.crs,
                scale: params.scale,
            },
            region: params.region.expr(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["description"], "diff_2019_10");
        assert_eq!(
            json["fileExportOptions"]["driveDestination"]["folder"],
            "exampleHansenOutputs"
        );
        assert_eq!(json["fileExportOptions"]["fileFormat"], "GEO_TIFF");
        assert_eq!(
            json["fileExportOptions"]["geoTiffOptions"]["fileDimensions"],
            512
        );
        assert_eq!(json["grid"]["crsCode"], "EPSG:4326");
        assert_eq!(json["maxPixels"], 10_000_000_000_000_u64);
        assert!(json["expression"]["functionInvocationValue"].is_object());
        assert!(json["region"]["functionInvocationValue"].is_object());
    }
}
