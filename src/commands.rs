use anyhow::{Context, Result, bail};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{ChromaClient, DistanceSpace, VectorStore};
use crate::embeddings::{EmbeddingSource, OllamaClient};
use crate::ingest::{DeleteDecision, IngestReport, Ingestor, prepare_collection};
use crate::query::{Asker, resolve_question};
use crate::reader::TextReader;

/// Ingest every document listed in the manifest into the configured collection
#[inline]
pub fn run_ingest(
    config: &Config,
    manifest: Option<&Path>,
    decision: &dyn DeleteDecision,
) -> Result<IngestReport> {
    let manifest = manifest.unwrap_or(config.ingest.manifest.as_path());
    if !manifest.exists() {
        bail!("Manifest not found: {}", manifest.display());
    }

    let store = ChromaClient::new(&config.vector_store)?;
    let ollama = OllamaClient::new(&config.ollama)?;
    let fetch_timeout = Duration::from_secs(config.ingest.fetch_timeout_seconds.max(1));
    let reader = TextReader::new(fetch_timeout);

    let source = config.embedding_source();
    info!(
        "Embedding with {}",
        source.model_name().unwrap_or("the vector store's built-in function")
    );

    let collection = prepare_collection(&store, &config.vector_store.collection, decision)?;

    let report = Ingestor::new(&store, &ollama, &reader, source, config.chunking.clone())
        .with_progress()
        .run(manifest, &collection)?;

    println!("--- {:.3} seconds ---", report.elapsed.as_secs_f64());
    Ok(report)
}

/// Answer a question from the stored chunks, streaming the reply to stdout
#[inline]
pub fn run_ask(config: &Config, words: &[String]) -> Result<()> {
    let question = resolve_question(words, &config.query.default_question);
    info!("Question: {}", question);

    let store = ChromaClient::new(&config.vector_store)?;
    let ollama = OllamaClient::new(&config.ollama)?;
    let collection =
        store.get_or_create_collection(&config.vector_store.collection, DistanceSpace::Cosine)?;

    let asker = Asker::new(
        &store,
        &ollama,
        &ollama,
        config.embedding_source(),
        config.query.n_results,
    );

    let mut stdout = io::stdout().lock();
    let answer = asker.ask(&question, &collection, &mut stdout)?;
    writeln!(stdout).context("Failed to write answer")?;

    if answer.matches.is_empty() {
        warn!(
            "Collection {} returned no chunks; the answer has no supporting text",
            collection.name
        );
    }
    for m in &answer.matches {
        info!(
            "Used {} from {}",
            m.id,
            m.source.as_deref().unwrap_or("unknown source")
        );
    }

    Ok(())
}

/// Report whether the vector store and Ollama are reachable
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("📊 RAG Docs Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Vector Store Status:");
    match ChromaClient::new(&config.vector_store) {
        Ok(store) => match store.heartbeat() {
            Ok(()) => {
                println!(
                    "   ✅ Chroma: Connected ({}:{})",
                    config.vector_store.host, config.vector_store.port
                );
                report_collection(&store, &config.vector_store.collection);
            }
            Err(e) => {
                println!("   ❌ Chroma: Failed to connect - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Chroma: Invalid configuration - {}", e);
        }
    }

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let source = config.embedding_source();
            match client.health_check(source != EmbeddingSource::Internal) {
                Ok(()) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                }
                Err(e) => {
                    println!("   ⚠️  Ollama: Connected but unhealthy - {}", e);
                }
            }
            match source.model_name() {
                Some(model) => println!("   📋 Embedding model: {}", model),
                None => println!("   📋 Embedding model: built into the vector store"),
            }
            println!("   💬 Main model: {}", config.ollama.main_model);
        }
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {}", e);
        }
    }

    Ok(())
}

fn report_collection(store: &ChromaClient, name: &str) {
    let collection = match store.find_collection(name) {
        Ok(collection) => collection,
        Err(e) => {
            println!("   ⚠️  Collections: Failed to list - {}", e);
            return;
        }
    };

    let Some(collection) = collection else {
        println!("   💤 Collection {}: not created yet", name);
        return;
    };

    match store.count(&collection) {
        Ok(count) => println!("   📚 Collection {}: {} chunks", name, count),
        Err(e) => println!("   ⚠️  Collection {}: Failed to count - {}", name, e),
    }
}
