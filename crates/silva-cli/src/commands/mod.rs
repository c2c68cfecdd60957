//! Subcommand implementations.

pub mod export_diff;
pub mod partition;
