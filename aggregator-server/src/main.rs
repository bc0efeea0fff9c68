//! Binary crate for the `aggregator` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Logging setup
//! - Running the HTTP service or a one-shot aggregation

use aggregator_server::{cli::Cli, telemetry};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = Cli::parse();
    telemetry::init(cmd.log_format);
    cmd.run().await
}
