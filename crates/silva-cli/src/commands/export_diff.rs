//! The `export-diff` subcommand: build and export a yearly difference
//! image.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use silva_earthengine::hansen::{
    SENTINEL2_ASSET, before_after_collections, difference_image, hansen_loss_image,
    mask_sentinel2_clouds,
};
use silva_earthengine::{
    EngineClient, EngineConfig, ExportParams, Geometry, ImageCollection, TaskStatus,
};

use crate::config::{EngineArgs, ExportDiffArgs};

/// Tracing target for the export command.
pub const TRACING_TARGET: &str = "silva_cli::export_diff";

/// Builds the difference graph for the year and submits the export.
pub async fn run(engine: &EngineArgs, args: &ExportDiffArgs) -> anyhow::Result<()> {
    let client = EngineClient::connect(engine_config(engine))
        .await
        .context("failed to initialize the imagery session")?;

    let region = load_region(&args.region)
        .with_context(|| format!("failed to read region file {}", args.region.display()))?;

    let source = ImageCollection::asset(SENTINEL2_ASSET)
        .filter_bounds(&region)
        .filter_lt("CLOUDY_PIXEL_PERCENTAGE", args.max_cloud_pct);

    let (before, after) = before_after_collections(&source, args.year);
    let before = mask_sentinel2_clouds(&before).median();
    let after = mask_sentinel2_clouds(&after).median();
    let hansen = hansen_loss_image(args.year);

    let bands: Vec<&str> = args.bands.iter().map(String::as_str).collect();
    let diff = difference_image(&before, &after, &hansen, &bands);

    let params = ExportParams::new(
        ExportParams::diff_description(args.year, args.scale),
        &args.folder,
        region,
    )
    .with_scale(args.scale)
    .with_crs(&args.crs);

    let task = client
        .export_image_to_drive(&diff, &params)
        .await
        .context("failed to start the export")?;

    tracing::info!(
        target: TRACING_TARGET,
        task = task.name(),
        year = args.year,
        folder = %args.folder,
        "export submitted"
    );

    if args.wait {
        let status = task
            .wait_until_done(Duration::from_secs(args.poll_interval_secs))
            .await
            .context("export polling failed")?;

        if let TaskStatus::Failed { message } = status {
            anyhow::bail!("export failed: {message}");
        }
    }

    Ok(())
}

/// Builds the imagery-session configuration from CLI arguments.
fn engine_config(engine: &EngineArgs) -> EngineConfig {
    let mut config = EngineConfig::new().with_endpoint(&engine.ee_endpoint);
    if let Some(project) = &engine.ee_project {
        config = config.with_project(project);
    }
    if let Some(account) = &engine.ee_service_account {
        config = config.with_service_account(account);
    }
    if let Some(key_path) = &engine.ee_private_key_file {
        config = config.with_key_path(key_path);
    }
    config
}

/// Reads a polygon region from a JSON file of linear rings.
fn load_region(path: &Path) -> anyhow::Result<Geometry> {
    let bytes = std::fs::read(path)?;
    let rings: Vec<Vec<[f64; 2]>> = serde_json::from_slice(&bytes)?;
    anyhow::ensure!(!rings.is_empty(), "region file holds no polygon rings");
    Ok(Geometry::polygon(&rings))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_region_parses_rings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[[[-125.251, 41.018], [-121.559, 35.1434], [-117.736, 32.404]]]"
        )
        .unwrap();

        let region = load_region(file.path()).unwrap();
        let json = serde_json::to_string(region.expr()).unwrap();
        assert!(json.contains("-125.251"));
    }

    #[test]
    fn test_load_region_rejects_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert!(load_region(file.path()).is_err());
    }
}
