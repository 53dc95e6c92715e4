//! CLI module for Montage
//!
//! Provides commands for working with plan files offline:
//! - `validate`: Check a plan against a tool catalog and editing context
//! - `order`: Print the execution order of a plan
//! - `simulate`: Dry-run a plan with tools that echo their arguments
//! - `tools`: List a tool catalog by category
//! - `config`: Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod config;
pub mod plan;
pub mod simulate;
pub mod tools;

/// Montage plan orchestration CLI
#[derive(Parser, Debug)]
#[command(name = "montage")]
#[command(about = "Validate, order and dry-run editing plans")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file layered over the defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Inputs shared by the plan commands
#[derive(clap::Args, Debug, Clone)]
pub struct PlanArgs {
    /// Plan file (JSON)
    pub plan: PathBuf,

    /// Tool catalog file: a JSON array of tool definitions
    #[arg(long)]
    pub catalog: PathBuf,

    /// Editing context file (JSON)
    #[arg(long)]
    pub context: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a plan
    Validate(PlanArgs),
    /// Print a plan's execution order
    Order {
        /// Plan file (JSON)
        plan: PathBuf,
    },
    /// Validate, then dry-run a plan
    Simulate(PlanArgs),
    /// List the tools in a catalog
    Tools {
        /// Tool catalog file: a JSON array of tool definitions
        catalog: PathBuf,

        /// Only show this category
        #[arg(long)]
        category: Option<String>,

        /// Print tool names only
        #[arg(long)]
        names: bool,
    },
    /// Print the effective configuration
    Config,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Some(Commands::Validate(args)) => plan::validate(&args, config_path),
        Some(Commands::Order { plan }) => plan::order(&plan),
        Some(Commands::Simulate(args)) => simulate::run(&args, config_path).await,
        Some(Commands::Tools {
            catalog,
            category,
            names,
        }) => tools::list(&catalog, category.as_deref(), names),
        Some(Commands::Config) => config::show(config_path),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
