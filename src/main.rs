//! # Axiomus CLI (`axiomus`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `axiomus serve` | Load the pipeline and start the HTTP service |
//! | `axiomus ask "<question>"` | Answer one question in-process |
//! | `axiomus bot` | Run the Telegram front end |
//!
//! ## Examples
//!
//! ```bash
//! axiomus --config ./config/axiomus.toml serve
//! axiomus ask "Where is ETSII?"
//! TELEGRAM_TOKEN=123:abc ML_API_URL=http://ml_service:8000 axiomus bot
//! ```

use axiomus::{ask, bot, config, server};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Axiomus: retrieval-augmented question answering over a fact base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used. See
/// `config/axiomus.example.toml` for every key.
#[derive(Parser)]
#[command(
    name = "axiomus",
    about = "Axiomus: retrieval-augmented question answering over a fact base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/axiomus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    ///
    /// Loads the knowledge base and QA model, then binds to `[server].bind`.
    /// A failed load is logged and the service starts degraded.
    Serve,

    /// Answer a single question without starting the server.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Run the Telegram bot front end.
    ///
    /// Requires `TELEGRAM_TOKEN`. The service URL comes from `ML_API_URL`
    /// or `[bot].api_url`.
    Bot,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("axiomus=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: &Path) -> anyhow::Result<config::Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::info!(
            "config file {} not found, using defaults",
            path.display()
        );
        Ok(config::Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = resolve_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::Bot => {
            bot::run_bot(&cfg).await?;
        }
    }

    Ok(())
}
