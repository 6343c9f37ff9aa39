//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use strand_core::config::Config;

mod commands;

#[derive(Parser)]
#[command(name = "strand")]
#[command(version)]
#[command(about = "Streaming code generation against Ollama-compatible backends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the backend base URL from config
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Override the model from config
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Stream a completion for a bare prompt
    Generate {
        /// The prompt to send to the model
        prompt: String,

        /// Write the first fenced code block here once the stream ends
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Stream a chat completion
    Chat {
        /// The prompt to send as the user message
        prompt: String,

        /// Override the system prompt from config
        #[arg(long)]
        system: Option<String>,

        /// Write the first fenced code block here once the stream ends
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Generate a short title for a prompt
    Title {
        /// The prompt to derive a title from
        prompt: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = Config::load().context("load config")?;

    // resolve once: flag > OLLAMA_BASE_URL > config
    config.base_url = config
        .effective_base_url(cli.base_url.as_deref())
        .context("resolve backend base URL")?;
    if let Some(model) = cli.model {
        config.model = model;
    }

    match cli.command {
        Commands::Generate { prompt, out } => {
            commands::generate::run(&config, &prompt, out.as_deref()).await
        }
        Commands::Chat {
            prompt,
            system,
            out,
        } => commands::chat::run(&config, &prompt, system.as_deref(), out.as_deref()).await,
        Commands::Title { prompt } => commands::title::run(&config, &prompt).await,
        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
