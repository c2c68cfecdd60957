//! The `partition` subcommand: split a sample folder into test/train.

use anyhow::Context;
use silva_drive::{DriveClient, DriveClientConfig, PartitionConfig, Partitioner};

use crate::config::{DriveArgs, PartitionArgs};

/// Tracing target for the partition command.
pub const TRACING_TARGET: &str = "silva_cli::partition";

/// Connects to the storage service and runs the partition.
pub async fn run(drive: &DriveArgs, args: &PartitionArgs) -> anyhow::Result<()> {
    let config = DriveClientConfig::new()
        .with_endpoint(&drive.drive_endpoint)
        .with_token_path(&drive.drive_token_file)
        .with_page_size(args.page_size);

    let client = DriveClient::connect(config)
        .await
        .context("failed to connect to the storage service")?;

    let partition_config = PartitionConfig::new()
        .with_test_name(&args.test_name)
        .with_train_name(&args.train_name)
        .with_test_ratio(args.test_ratio)
        .with_page_size(args.page_size)
        .with_move_concurrency(args.move_concurrency);

    let partitioner =
        Partitioner::new(&client, partition_config).context("invalid partition configuration")?;

    let mut rng = rand::rng();
    let summary = partitioner
        .run(&args.parent, &mut rng)
        .await
        .context("partition run failed")?;

    tracing::info!(
        target: TRACING_TARGET,
        parent = %args.parent,
        moved_to_test = summary.moved_to_test,
        moved_to_train = summary.moved_to_train,
        "partition finished"
    );

    Ok(())
}
