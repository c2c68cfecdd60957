//! CLI configuration management.
//!
//! All configuration can be provided via CLI arguments or environment
//! variables; the environment names match what the pipeline has always
//! used (`EE_PROJECT`, `EE_SERVICE_ACCOUNT`, `EE_PRIVATE_KEY_FILE`,
//! `EE_ENDPOINT`, `DRIVE_TOKEN_FILE`). Use `--help` to see everything.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::TRACING_TARGET_CONFIG;

/// Complete CLI configuration.
#[derive(Debug, Parser)]
#[command(name = "silva")]
#[command(about = "Forest-loss imagery pipeline tools")]
#[command(version)]
pub struct Cli {
    /// Storage-service configuration.
    #[clap(flatten)]
    pub drive: DriveArgs,

    /// Imagery-service configuration.
    #[clap(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split a sample folder into test and train subfolders.
    Partition(PartitionArgs),
    /// Build and export a yearly difference image.
    ExportDiff(ExportDiffArgs),
}

/// Storage-service connection options.
#[derive(Debug, Args)]
pub struct DriveArgs {
    /// Base URL of the storage service API.
    #[arg(long, env = "DRIVE_ENDPOINT", default_value = "https://www.googleapis.com")]
    pub drive_endpoint: String,

    /// Path of the cached OAuth token file.
    #[arg(long, env = "DRIVE_TOKEN_FILE", default_value = "token.json")]
    pub drive_token_file: PathBuf,
}

/// Imagery-service connection options.
#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Base URL of the imagery service API.
    #[arg(long, env = "EE_ENDPOINT", default_value = "https://earthengine.googleapis.com")]
    pub ee_endpoint: String,

    /// Cloud project the imagery session is billed against.
    #[arg(long, env = "EE_PROJECT")]
    pub ee_project: Option<String>,

    /// Service-account email for the imagery session.
    #[arg(long, env = "EE_SERVICE_ACCOUNT")]
    pub ee_service_account: Option<String>,

    /// Path of the service-account private key file.
    #[arg(long, env = "EE_PRIVATE_KEY_FILE")]
    pub ee_private_key_file: Option<PathBuf>,
}

/// Arguments for the `partition` subcommand.
#[derive(Debug, Args)]
pub struct PartitionArgs {
    /// Name of the parent folder holding the exported samples.
    #[arg(long)]
    pub parent: String,

    /// Name of the test folder created under the parent.
    #[arg(long, default_value = "test")]
    pub test_name: String,

    /// Name of the train folder created under the parent.
    #[arg(long, default_value = "train")]
    pub train_name: String,

    /// Probability of assigning a file to the test folder.
    #[arg(long, default_value_t = 0.2)]
    pub test_ratio: f64,

    /// Page size for file listing calls.
    #[arg(long, default_value_t = 100)]
    pub page_size: u32,

    /// Number of file moves in flight at once.
    #[arg(long, default_value_t = 1)]
    pub move_concurrency: usize,
}

/// Arguments for the `export-diff` subcommand.
#[derive(Debug, Args)]
pub struct ExportDiffArgs {
    /// Year to build the difference image for.
    #[arg(long)]
    pub year: i32,

    /// Path of a JSON file holding polygon rings of [lon, lat] pairs.
    #[arg(long)]
    pub region: PathBuf,

    /// Change bands stacked into the difference image.
    #[arg(long, value_delimiter = ',', default_value = "B4,B3,B2")]
    pub bands: Vec<String>,

    /// Destination folder in the storage service.
    #[arg(long, default_value = "exampleHansenOutputs")]
    pub folder: String,

    /// Export resolution in meters per pixel.
    #[arg(long, default_value_t = 10)]
    pub scale: u32,

    /// Export projection.
    #[arg(long, default_value = "EPSG:4326")]
    pub crs: String,

    /// Maximum cloudy-pixel percentage kept in the source collection.
    #[arg(long, default_value_t = 20.0)]
    pub max_cloud_pct: f64,

    /// Poll the export until it reaches a terminal state.
    #[arg(long)]
    pub wait: bool,

    /// Poll interval in seconds when waiting.
    #[arg(long, default_value_t = 10)]
    pub poll_interval_secs: u64,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and
    /// parses CLI arguments.
    ///
    /// .env loading happens before clap parses arguments so that
    /// environment variables from .env can act as defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature
    /// is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Logs configuration at debug level (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            drive_endpoint = %self.drive.drive_endpoint,
            ee_endpoint = %self.engine.ee_endpoint,
            ee_project = self.engine.ee_project.as_deref().unwrap_or("<none>"),
            features = ?Self::enabled_features(),
            "configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_partition_defaults() {
        let cli = Cli::try_parse_from(["silva", "partition", "--parent", "HansenSamples"]).unwrap();
        let Command::Partition(args) = cli.command else {
            panic!("expected partition command");
        };
        assert_eq!(args.parent, "HansenSamples");
        assert_eq!(args.test_name, "test");
        assert_eq!(args.train_name, "train");
        assert_eq!(args.test_ratio, 0.2);
        assert_eq!(args.move_concurrency, 1);
    }

    #[test]
    fn test_export_diff_band_list() {
        let cli = Cli::try_parse_from([
            "silva",
            "export-diff",
            "--year",
            "2019",
            "--region",
            "aoi.json",
            "--bands",
            "B8,B4",
        ])
        .unwrap();
        let Command::ExportDiff(args) = cli.command else {
            panic!("expected export-diff command");
        };
        assert_eq!(args.year, 2019);
        assert_eq!(args.bands, vec!["B8", "B4"]);
        assert_eq!(args.scale, 10);
        assert!(!args.wait);
    }

    #[test]
    fn test_missing_required_args_rejected() {
        assert!(Cli::try_parse_from(["silva", "partition"]).is_err());
        assert!(Cli::try_parse_from(["silva", "export-diff", "--year", "2019"]).is_err());
    }
}
