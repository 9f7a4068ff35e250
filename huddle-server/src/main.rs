#![cfg_attr(not(test), forbid(unsafe_code))]

//! Main entry point for the Huddle server binary.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use server::{commands::spec::generate_spec, server::run};
use shared::config::server::Config;
use std::path::PathBuf;

/// Main CLI structure for the Huddle server
#[derive(Debug, Parser)]
#[command(name = "huddle-server")]
#[command(about = "Chat server for Huddle: history, sending and realtime fan-out", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Port to bind; overrides the configuration file and environment.
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to a YAML, JSON or TOML configuration file.
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Keep all data in process memory instead of PostgreSQL.
        #[arg(long)]
        in_memory: bool,
    },
    /// Print or write the OpenAPI document
    Spec {
        /// `json`, `yaml`, or an output file path. Defaults to YAML on stdout.
        output: Option<String>,
    },
}

/// Loads `.env` and parses the command line.
#[must_use]
pub fn initialize_cli() -> Cli {
    dotenv().ok();
    Cli::parse()
}

/// Loads configuration and runs the server until shutdown.
///
/// # Errors
/// Returns an error if configuration is invalid or the server fails to start.
pub async fn handle_serve_command(
    port: Option<u16>,
    config: Option<PathBuf>,
    in_memory: bool,
) -> anyhow::Result<()> {
    let resolved_config = Config::load_config(config, port)?;
    run(resolved_config, in_memory).await
}

/// # Errors
/// Returns an error if the selected command fails.
pub async fn run_app(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            port,
            config,
            in_memory,
        } => handle_serve_command(port, config, in_memory).await,
        Commands::Spec { output } => generate_spec(output.as_deref()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_app(initialize_cli()).await
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
    fn serve_accepts_port_config_and_memory_flag() {
        let cli = Cli::try_parse_from([
            "huddle-server",
            "serve",
            "--port",
            "9000",
            "--config",
            "huddle.yaml",
            "--in-memory",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve {
                port,
                config,
                in_memory,
            } => {
                assert_eq!(port, Some(9000));
                assert_eq!(config, Some(PathBuf::from("huddle.yaml")));
                assert!(in_memory);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["huddle-server", "invalid-command"]).is_err());
    }
}
