//! Workshop portal CLI, the main entry point.
//!
//! Commands:
//! - `serve`   Start the portal HTTP server
//! - `agent`   Run the tool-calling agent once from the terminal
//! - `lookup`  Query the knowledge base
//! - `doctor`  Diagnose configuration gaps
//! - `config`  Print a default configuration file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "workshop-portal",
    about = "Workshop portal for Azure OpenAI chat, agent and image playgrounds",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file (else `WORKSHOP_PORTAL_CONFIG`, else ./workshop-portal.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the portal HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the workshop agent a single question
    Agent {
        /// The question to send
        #[arg(short, long)]
        message: String,

        /// Optional system prompt
        #[arg(short, long)]
        system: Option<String>,
    },

    /// Print the knowledge base snippets that best match a query
    Lookup {
        query: String,

        /// Number of snippets to print
        #[arg(short = 'k', long, default_value_t = 3)]
        top_k: usize,
    },

    /// Diagnose configuration gaps
    Doctor,

    /// Print a default configuration file
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Agent { message, system } => {
            commands::agent::run(config_path, message, system).await?
        }
        Commands::Lookup { query, top_k } => {
            commands::lookup::run(config_path, query, top_k).await?
        }
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Config => commands::config_cmd::run(),
    }

    Ok(())
}
