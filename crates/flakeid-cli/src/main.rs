#![doc = include_str!("../README.md")]

mod cli;

use clap::Parser;
use cli::config::{CliArgs, Config};
use cli::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = Config::try_from(args)?;

    init_telemetry(config.log_json)?;
    tracing::debug!(?config, "starting");

    cli::commands::run(config).await
}
