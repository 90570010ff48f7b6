//! tilegen CLI - Command-line interface
//!
//! Plans, generates and validates raster tile sets for a project file by
//! driving workers inside the rendering stack's environment.

mod commands;
mod error;
mod runner;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::{OutputArgs, ProjectArgs};
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "tilegen")]
#[command(version)]
#[command(about = "Generate raster map tiles from an external rendering service", long_about = None)]
struct Cli {
    /// Engine settings file (default: ~/.tilegen/config.ini)
    #[arg(long, global = true, value_name = "INI")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how many tiles a project covers, per zoom level
    Estimate {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Generate every missing tile of a project
    Run {
        #[command(flatten)]
        project: ProjectArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Rendering endpoint base URL (overrides config)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,

        /// Retry rounds after the first pass (overrides config)
        #[arg(long, value_name = "N")]
        max_rounds: Option<u32>,

        /// Per-round worker timeout in seconds, 0 for none (overrides config)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Don't draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Check which planned tiles are present on disk
    Validate {
        #[command(flatten)]
        project: ProjectArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the worker program a run would execute
    Script {
        #[command(flatten)]
        project: ProjectArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Rendering endpoint base URL (overrides config)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,

        /// Only include tiles missing on disk
        #[arg(long)]
        missing_only: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Estimate { project } => commands::estimate::run(&project),
        Commands::Run {
            project,
            output,
            endpoint,
            max_rounds,
            timeout,
            no_progress,
        } => commands::run::run(RunArgs {
            config,
            project,
            output,
            endpoint,
            max_rounds,
            timeout,
            no_progress,
        }),
        Commands::Validate { project, output } => {
            commands::validate::run(config, &project, &output)
        }
        Commands::Script {
            project,
            output,
            endpoint,
            missing_only,
        } => commands::script::run(config, &project, &output, endpoint, missing_only),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => e.exit(),
    }
}
