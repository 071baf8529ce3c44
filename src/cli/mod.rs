//! azqr CLI
//!
//! `azqr scan` runs the full pipeline, `azqr plugins` lists, describes and
//! runs plugins.

mod commands;
mod context;

pub use context::CliContext;

use clap::{Parser, Subcommand};

/// Azure Quick Review - audit Azure resources against best practices
#[derive(Parser, Debug)]
#[command(name = "azqr", version, about = "Azure Quick Review")]
pub struct Cli {
    /// Enable debug logging and pipeline metrics
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan subscriptions, resource groups or management groups
    Scan(commands::scan::ScanCommandArgs),

    /// List, describe and run plugins
    Plugins(commands::plugins::PluginsArgs),
}

pub struct CliApp {
    cli: Cli,
    context: CliContext,
}

impl CliApp {
    pub fn new() -> anyhow::Result<Self> {
        let cli = Cli::parse();
        let context = CliContext::new(cli.debug)?;
        Ok(Self { cli, context })
    }

    pub async fn run(self) -> anyhow::Result<u8> {
        match &self.cli.command {
            Commands::Scan(args) => commands::scan::run(&self.context, &self.cli, args).await,
            Commands::Plugins(args) => commands::plugins::run(&self.context, &self.cli, args).await,
        }
    }
}

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: u8 = 0;
    /// Any fatal error, reported on stderr
    pub const ERROR: u8 = 1;
}
