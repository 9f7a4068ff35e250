//! Main entry point for the Huddle CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use server::{commands::spec::generate_spec, server::run};
use shared::config::server::{Config, Profile};
use std::path::PathBuf;

mod commands;

use commands::{
    chat::{HistoryArgs, OpenArgs, SendArgs, WatchArgs},
    client::ConnectArgs,
    session::UseArgs,
};

/// Huddle CLI
#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Command-line interface for Huddle chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// The port number to bind the server to (e.g., 8080)
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to the configuration file (yaml, json or toml)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Keep all data in process memory instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },
    /// Generate the OpenAPI specification
    Spec {
        /// Output path (YAML or JSON by extension), or "json"/"yaml" for stdout
        output_path: Option<String>,
    },
    /// Generate shell completion scripts for the CLI
    Completion {
        /// Shell to generate for (bash, zsh, fish, powershell, elvish)
        #[arg(long, short)]
        shell: clap_complete::Shell,
    },
    /// Generate a configuration file in the current directory
    Config {
        /// yaml or json
        #[arg(long, short, default_value = "yaml")]
        format: String,

        /// Profile whose defaults are written: dev, test or prod
        #[arg(long, default_value = "dev", value_parser = parse_profile)]
        profile: Profile,
    },
    /// Manage the identity this CLI acts as
    #[command(subcommand)]
    Session(SessionCommands),
    /// List your conversations, most recently active first
    Conversations(ConnectArgs),
    Open(OpenArgs),
    History(HistoryArgs),
    Send(SendArgs),
    Watch(WatchArgs),
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Save a user id to act as
    Use(UseArgs),
    /// Show the profile of the current identity
    Whoami(ConnectArgs),
    /// Forget the saved identity
    Clear,
}

fn parse_profile(value: &str) -> Result<Profile, String> {
    match value {
        "dev" => Ok(Profile::Dev),
        "test" => Ok(Profile::Test),
        "prod" => Ok(Profile::Prod),
        other => Err(format!("unknown profile `{other}`")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            config,
            in_memory,
        } => {
            let resolved_config = Config::load_config(config, port)?;
            run(resolved_config, in_memory).await?;
        }
        Commands::Spec { output_path } => generate_spec(output_path.as_deref())?,
        Commands::Completion { shell } => commands::completion::generate_completion(shell),
        Commands::Config { format, profile } => {
            let dir = std::env::current_dir().context("no working directory")?;
            commands::config::generate_config(&dir, profile, &format)?;
        }
        Commands::Session(SessionCommands::Use(args)) => commands::session::use_identity(&args)?,
        Commands::Session(SessionCommands::Whoami(args)) => {
            commands::session::whoami(&args).await?;
        }
        Commands::Session(SessionCommands::Clear) => commands::session::clear()?,
        Commands::Conversations(args) => commands::chat::handle_conversations(args).await?,
        Commands::Open(args) => commands::chat::handle_open(args).await?,
        Commands::History(args) => commands::chat::handle_history(args).await?,
        Commands::Send(args) => commands::chat::handle_send(args).await?,
        Commands::Watch(args) => commands::chat::handle_watch(args).await?,
    }

    Ok(())
}
