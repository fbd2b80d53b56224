use clap::{Parser, Subcommand};
use ragdocs::commands::{run_ask, run_ingest, show_status};
use ragdocs::config::{Config, run_interactive_config, show_config};
use ragdocs::ingest::{DeleteDecision, InteractivePrompt, PresetAnswer};
use ragdocs::{RagError, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log level used when `RUST_LOG` is unset, so ingestion progress is visible
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "ragdocs")]
#[command(about = "Retrieval-augmented question answering over local documents")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to ~/.ragdocs)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, the vector store and chunking
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store every document listed in the manifest
    Ingest {
        /// Manifest file to read instead of the configured one
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Delete an existing collection without asking
        #[arg(long, conflicts_with = "append")]
        recreate: bool,
        /// Keep an existing collection and add to it without asking
        #[arg(long)]
        append: bool,
    },
    /// Answer a question using the stored documents
    Ask {
        /// Question words; the configured default question is used when empty
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        question: Vec<String>,
    },
    /// Show connectivity and collection status
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_dir().map_err(|e| RagError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest {
            manifest,
            recreate,
            append,
        } => {
            let config = Config::load(&config_dir)?;
            let decision = delete_decision(recreate, append);
            run_ingest(&config, manifest.as_deref(), decision.as_ref())?;
        }
        Commands::Ask { question } => {
            let config = Config::load(&config_dir)?;
            run_ask(&config, &question)?;
        }
        Commands::Status => {
            let config = Config::load(&config_dir).unwrap_or_default();
            show_status(&config)?;
        }
    }

    Ok(())
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn delete_decision(recreate: bool, append: bool) -> Box<dyn DeleteDecision> {
    if recreate {
        Box::new(PresetAnswer(true))
    } else if append {
        Box::new(PresetAnswer(false))
    } else {
        Box::new(InteractivePrompt)
    }
}
