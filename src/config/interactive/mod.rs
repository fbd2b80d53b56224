
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;
use std::time::Duration;

use super::{Config, OllamaConfig, VectorStoreConfig};
use crate::config::settings::is_valid_collection_name;
use crate::embeddings::EmbeddingSource;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 ragdocs Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Models used for embeddings and for answering questions.");
    eprintln!(
        "Use '{}' as the embedding model to let the vector store embed documents itself.",
        EmbeddingSource::INTERNAL
    );
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Vector Store Configuration").bold().yellow());
    eprintln!("Chroma server holding the document chunks.");
    eprintln!();

    configure_vector_store(&mut config.vector_store)?;

    eprintln!();
    eprintln!("{}", style("Chunking").bold().yellow());

    configure_chunking(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    report_connection(
        "Ollama",
        &config.ollama.protocol,
        &config.ollama.host,
        config.ollama.port,
        "/api/version",
    );
    report_connection(
        "Chroma",
        &config.vector_store.protocol,
        &config.vector_store.host,
        config.vector_store.port,
        "/api/v2/heartbeat",
    );

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());

    let mut current_section = "";
    for (section, label, value) in config_summary(&config) {
        if section != current_section {
            eprintln!();
            eprintln!("{}", style(format!("{section}:")).bold().yellow());
            current_section = section;
        }
        eprintln!("  {}: {}", label, style(value).cyan());
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Flattened view of the settings shown by `ragdocs config --show`
fn config_summary(config: &Config) -> Vec<(&'static str, &'static str, String)> {
    let ollama_url = config
        .ollama_url()
        .map_or_else(|e| format!("Invalid ({e})"), |url| url.to_string());
    let store_url = config
        .vector_store_url()
        .map_or_else(|e| format!("Invalid ({e})"), |url| url.to_string());

    vec![
        ("Ollama Settings", "URL", ollama_url),
        (
            "Ollama Settings",
            "Embedding model",
            config.ollama.embed_model.clone(),
        ),
        (
            "Ollama Settings",
            "Main model",
            config.ollama.main_model.clone(),
        ),
        (
            "Ollama Settings",
            "Embedding timeout",
            format!("{}s", config.ollama.timeout_seconds),
        ),
        ("Vector Store Settings", "URL", store_url),
        (
            "Vector Store Settings",
            "Tenant / database",
            format!("{} / {}", config.vector_store.tenant, config.vector_store.database),
        ),
        (
            "Vector Store Settings",
            "Collection",
            config.vector_store.collection.clone(),
        ),
        (
            "Vector Store Settings",
            "Request timeout",
            format!("{}s", config.vector_store.timeout_seconds),
        ),
        (
            "Pipeline Settings",
            "Sentences per chunk",
            config.chunking.sentences_per_chunk.to_string(),
        ),
        (
            "Pipeline Settings",
            "Sentence overlap",
            config.chunking.overlap.to_string(),
        ),
        (
            "Pipeline Settings",
            "Manifest",
            config.ingest.manifest.display().to_string(),
        ),
        (
            "Pipeline Settings",
            "Source fetch timeout",
            format!("{}s", config.ingest.fetch_timeout_seconds),
        ),
        (
            "Pipeline Settings",
            "Results per query",
            config.query.n_results.to_string(),
        ),
    ]
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn select_protocol(prompt: &str, current: &str) -> Result<String> {
    let protocols = &["http", "https"];
    let default_index = protocols.iter().position(|&p| p == current).unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt(prompt)
        .default(default_index)
        .items(protocols)
        .interact()?;

    Ok(protocols
        .get(protocol_index)
        .copied()
        .unwrap_or("http")
        .to_string())
}

fn input_port(prompt: &str, current: u16) -> Result<u16> {
    let port: u16 = Input::new()
        .with_prompt(prompt)
        .default(current)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(port)
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocol = select_protocol("Ollama protocol", &ollama.protocol)?;

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .interact_text()?;

    let port = input_port("Ollama port", ollama.port)?;

    let embed_model: String = Input::new()
        .with_prompt("Embedding model (embedmodel)")
        .default(ollama.embed_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let main_model: String = Input::new()
        .with_prompt("Answering model (mainmodel)")
        .default(ollama.main_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else if input == EmbeddingSource::INTERNAL {
                Err("The answering model must be an Ollama model")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_port(port)?;
    ollama.set_host(host)?;
    ollama.set_embed_model(embed_model)?;
    ollama.set_main_model(main_model)?;

    Ok(())
}

fn configure_vector_store(store: &mut VectorStoreConfig) -> Result<()> {
    let protocol = select_protocol("Chroma protocol", &store.protocol)?;

    let host: String = Input::new()
        .with_prompt("Chroma host")
        .default(store.host.clone())
        .interact_text()?;

    let port = input_port("Chroma port", store.port)?;

    let collection: String = Input::new()
        .with_prompt("Collection name")
        .default(store.collection.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if is_valid_collection_name(input) {
                Ok(())
            } else {
                Err("Use 3-63 characters of letters, digits, '.', '_' or '-'")
            }
        })
        .interact_text()?;

    store.protocol = protocol;
    store.host = host;
    store.port = port;
    store.set_collection(collection)?;
    store.validate()?;

    Ok(())
}

fn configure_chunking(config: &mut Config) -> Result<()> {
    let sentences_per_chunk: usize = Input::new()
        .with_prompt("Sentences per chunk")
        .default(config.chunking.sentences_per_chunk)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("A chunk needs at least one sentence")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let overlap: usize = Input::new()
        .with_prompt("Sentence overlap between chunks")
        .default(config.chunking.overlap.min(sentences_per_chunk.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input >= sentences_per_chunk {
                Err("Overlap must be smaller than the chunk size")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    config.chunking.sentences_per_chunk = sentences_per_chunk;
    config.chunking.overlap = overlap;
    config.chunking.validate()?;

    Ok(())
}

fn report_connection(name: &str, protocol: &str, host: &str, port: u16, path: &str) {
    if test_connection(protocol, host, port, path) {
        eprintln!("{}", style(format!("✓ {name} connection successful!")).green());
    } else {
        eprintln!(
            "{}",
            style(format!("⚠ Warning: Could not connect to {name}")).yellow()
        );
        eprintln!("You can continue, but make sure {name} is running before ingesting.");
    }
}

fn test_connection(protocol: &str, host: &str, port: u16, path: &str) -> bool {
    let url = format!("{}://{}:{}{}", protocol, host, port, path);

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
