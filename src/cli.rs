//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// workshopctl - Provision and tear down per-participant workshop repositories
#[derive(Parser, Debug)]
#[command(name = "workshopctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision one repository per participant and template
    Provision(commands::provision::ProvisionArgs),

    /// Discover and delete previously provisioned repositories
    Teardown(commands::teardown::TeardownArgs),

    /// Check the manifest, roster and content directories without touching
    /// the network
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let style = workshopctl::output::OutputStyle::from_flag(&self.color);

        match self.command {
            Commands::Provision(args) => commands::provision::execute(args, style),
            Commands::Teardown(args) => commands::teardown::execute(args, style),
            Commands::Validate(args) => commands::validate::execute(args, style),
        }
    }
}

fn init_logging(level: &str) {
    let filter = level.parse().unwrap_or(log::LevelFilter::Warn);
    env_logger::Builder::from_default_env()
        .filter_level(filter)
        .init();
}
