//! Command-line interface definitions.

pub mod serve;
pub mod status;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "switchboard",
    version,
    about = "Local LLM request router with budget enforcement and context compaction"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the router server
    Serve(ServeArgs),
    /// Show router health and per-provider spend
    Status(StatusArgs),
    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Base URL of a running router
    #[arg(long, default_value = "http://127.0.0.1:8300")]
    pub url: String,
    /// Emit raw JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a commented example configuration file
    Init(InitArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the file
    #[arg(short, long, default_value = "switchboard.toml")]
    pub output: PathBuf,
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Example configuration shipped with the binary.
pub const EXAMPLE_CONFIG: &str = include_str!("../../switchboard.example.toml");

pub fn handle_config_init(args: &InitArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.output.display()
        );
    }
    std::fs::write(&args.output, EXAMPLE_CONFIG)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Wrote {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("switchboard.toml");
        std::fs::write(&output, "existing").unwrap();

        let args = InitArgs {
            output: output.clone(),
            force: false,
        };
        assert!(handle_config_init(&args).is_err());

        let args = InitArgs {
            output: output.clone(),
            force: true,
        };
        handle_config_init(&args).unwrap();
        assert!(std::fs::read_to_string(&output).unwrap().contains("[server]"));
    }
}
