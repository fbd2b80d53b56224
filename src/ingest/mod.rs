// Ingestion workflow
// Manifest sources are read, chunked by sentences, embedded and stored


pub mod manifest;

pub use manifest::{ManifestEntry, normalize_line, parse_manifest, read_manifest};

use anyhow::{Context, Result};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::database::{ChunkRecord, Collection, DistanceSpace, VectorStore};
use crate::embeddings::{ChunkingConfig, Embedder, EmbeddingSource, chunk_by_sentences};
use crate::reader::SourceReader;

/// Decides whether an existing collection is dropped before ingestion
pub trait DeleteDecision {
    fn should_delete(&self, collection_name: &str) -> Result<bool>;
}

/// Asks on the terminal; `yes` or `y` deletes, anything else keeps
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractivePrompt;

impl DeleteDecision for InteractivePrompt {
    #[inline]
    fn should_delete(&self, collection_name: &str) -> Result<bool> {
        let answer: String = Input::new()
            .with_prompt(format!(
                "Collection {} already exists, do you want to delete it? (yes/no)",
                collection_name
            ))
            .allow_empty(true)
            .interact_text()?;

        Ok(is_affirmative(&answer))
    }
}

/// A fixed answer, from `--recreate` / `--append`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetAnswer(pub bool);

impl DeleteDecision for PresetAnswer {
    #[inline]
    fn should_delete(&self, _collection_name: &str) -> Result<bool> {
        Ok(self.0)
    }
}

#[inline]
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "yes" | "y")
}

/// Make sure the named collection exists, dropping it first if the decision says so
///
/// The collection is (re)created with cosine distance.
#[inline]
pub fn prepare_collection<S, D>(store: &S, name: &str, decision: &D) -> Result<Collection>
where
    S: VectorStore + ?Sized,
    D: DeleteDecision + ?Sized,
{
    if store.has_collection(name)? {
        if decision.should_delete(name)? {
            info!("Deleting collection {}", name);
            store.delete_collection(name)?;
        } else {
            info!("Updating existing collection {}", name);
        }
    }

    let collection = store.get_or_create_collection(name, DistanceSpace::Cosine)?;
    Ok(collection)
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub chunks_added: usize,
    pub elapsed: Duration,
}

/// Reads, chunks, embeds and stores the sources named by a manifest
pub struct Ingestor<'a, S: ?Sized, E: ?Sized, R: ?Sized> {
    store: &'a S,
    embedder: &'a E,
    reader: &'a R,
    source: EmbeddingSource,
    chunking: ChunkingConfig,
    bar: ProgressBar,
}

impl<'a, S, E, R> Ingestor<'a, S, E, R>
where
    S: VectorStore + ?Sized,
    E: Embedder + ?Sized,
    R: SourceReader + ?Sized,
{
    #[inline]
    pub fn new(
        store: &'a S,
        embedder: &'a E,
        reader: &'a R,
        source: EmbeddingSource,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            reader,
            source,
            chunking,
            bar: ProgressBar::hidden(),
        }
    }

    /// Show a spinner on stderr while ingesting, when someone is watching
    #[inline]
    pub fn with_progress(mut self) -> Self {
        if console::user_attended_stderr() {
            self.bar = ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} [{pos} chunks] {msg}")
                    .expect("style template is valid"),
            );
        }
        self
    }

    /// Ingest every source listed in the manifest into `collection`
    ///
    /// The first failing source aborts the run; chunks already added stay.
    #[inline]
    pub fn run(&self, manifest_path: &Path, collection: &Collection) -> Result<IngestReport> {
        let start_time = Instant::now();
        let entries = read_manifest(manifest_path)?;
        info!(
            "Ingesting {} manifest entries from {} into {}",
            entries.len(),
            manifest_path.display(),
            collection.name
        );

        let mut report = IngestReport::default();
        for entry in &entries {
            let sources = entry.sources()?;
            if let ManifestEntry::Pattern(pattern) = entry {
                info!("Files for {}: {:?}", pattern, sources);
            }

            for source in &sources {
                info!("Processing {}", source);
                self.bar.set_message(source.clone());

                let text = self
                    .reader
                    .read_text(source)
                    .with_context(|| format!("Failed to read {}", source))?;
                if text.is_empty() {
                    debug!("No text in {}, skipping", source);
                    report.files_skipped += 1;
                    continue;
                }

                report.chunks_added += self.embed_document(&text, source, collection)?;
                report.files_processed += 1;
            }
        }

        self.bar.finish_and_clear();
        report.elapsed = start_time.elapsed();
        info!(
            "Ingested {} chunks from {} files ({} empty) in {:.3}s",
            report.chunks_added,
            report.files_processed,
            report.files_skipped,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    /// Chunk one document and add each chunk to the collection in order
    ///
    /// # Returns
    /// * `Result<usize>` - Number of chunks added
    #[inline]
    pub fn embed_document(
        &self,
        text: &str,
        filename: &str,
        collection: &Collection,
    ) -> Result<usize> {
        let chunks = chunk_by_sentences(text, &self.chunking)?;
        info!("{} with {} chunks", filename, chunks.len());

        for chunk in &chunks {
            let embedding = match &self.source {
                EmbeddingSource::Internal => None,
                EmbeddingSource::Model(_) => {
                    Some(self.embedder.embed(&chunk.text).with_context(|| {
                        format!("Failed to embed chunk {} of {}", chunk.chunk_index, filename)
                    })?)
                }
            };

            let record = ChunkRecord {
                id: ChunkRecord::chunk_id(filename, chunk.chunk_index),
                document: chunk.text.clone(),
                source: filename.to_string(),
                embedding,
            };

            self.store.add(collection, &record)?;
            debug!("Added chunk {}", record.id);
            self.bar.inc(1);
        }

        Ok(chunks.len())
    }
}
