//! Montage - Plan orchestration for the editing agent
//!
//! CLI entry point for checking and dry-running plans.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "montage=info,montage_core=info,montage_tools=warn".into()),
        )
        .with(cli.json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!cli.json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    cli::run(cli).await
}
