//! Binary crate for the `weather-dashboard` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - The interactive setup dialog
//! - Driving the dashboard tasks and writing frames

use clap::Parser;

mod cli;
mod console;
mod dashboard;
mod output;
mod setup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
