mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use sovereign::config::DEFAULT_CONFIG_FILE;

// ============================================================================
// CLI Types
// ============================================================================

/// Sovereign - ask a financial research agent and watch it think
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Backend URL (overrides config file)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        #[arg(value_name = "QUERY")]
        query: String,

        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Backend URL (overrides config file)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Store an API key for the backend
    Login {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,
    },

    /// Forget the stored API key
    Logout {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { config, server } => commands::chat::run(&config, server.as_deref()).await,
        Commands::Ask {
            query,
            config,
            server,
        } => commands::ask::run(&query, &config, server.as_deref()).await,
        Commands::Login { config } => commands::login::run(&config).await,
        Commands::Logout { config } => commands::login::logout(&config).await,
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Logs go to stderr so they never interleave with rendered answers.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
