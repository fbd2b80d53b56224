// Question answering
// Retrieves the nearest chunks for a question and streams the model's answer


use anyhow::{Context, Result};
use itertools::Itertools;
use std::io::Write;
use tracing::{debug, info};

use crate::database::{Collection, QueryInput, QueryMatch, VectorStore};
use crate::embeddings::{Embedder, EmbeddingSource};

/// Separator placed between retrieved chunk texts in the prompt
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Produces a completion as a stream of text fragments
pub trait Generator {
    fn generate(&self, prompt: &str) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>>;
}

/// Join command line words into the question, falling back to `default` when empty
#[inline]
pub fn resolve_question<S: AsRef<str>>(words: &[S], default: &str) -> String {
    let question = words.iter().map(AsRef::as_ref).join(" ");
    if question.is_empty() {
        default.to_string()
    } else {
        question
    }
}

#[inline]
pub fn build_prompt(question: &str, docs: &str) -> String {
    format!("{question} - Answer that question using the following text as a resource: {docs}")
}

/// Write each non-empty fragment as soon as it arrives
///
/// # Returns
/// * `Result<usize>` - Number of bytes written
#[inline]
pub fn write_fragments<I, W>(fragments: I, out: &mut W) -> Result<usize>
where
    I: IntoIterator<Item = Result<String>>,
    W: Write + ?Sized,
{
    let mut written = 0;
    for fragment in fragments {
        let fragment = fragment?;
        if fragment.is_empty() {
            continue;
        }
        out.write_all(fragment.as_bytes())
            .context("Failed to write answer")?;
        out.flush().context("Failed to flush answer")?;
        written += fragment.len();
    }
    Ok(written)
}

/// What an answered question was based on
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question: String,
    pub prompt: String,
    pub matches: Vec<QueryMatch>,
    pub bytes_written: usize,
}

/// Answers questions against one collection
pub struct Asker<'a, S: ?Sized, E: ?Sized, G: ?Sized> {
    store: &'a S,
    embedder: &'a E,
    generator: &'a G,
    source: EmbeddingSource,
    n_results: usize,
}

impl<'a, S, E, G> Asker<'a, S, E, G>
where
    S: VectorStore + ?Sized,
    E: Embedder + ?Sized,
    G: Generator + ?Sized,
{
    #[inline]
    pub fn new(
        store: &'a S,
        embedder: &'a E,
        generator: &'a G,
        source: EmbeddingSource,
        n_results: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            source,
            n_results,
        }
    }

    /// Nearest chunks to the question, closest first
    #[inline]
    pub fn retrieve(&self, question: &str, collection: &Collection) -> Result<Vec<QueryMatch>> {
        let matches = match &self.source {
            EmbeddingSource::Internal => {
                self.store
                    .query(collection, QueryInput::Text(question), self.n_results)?
            }
            EmbeddingSource::Model(model) => {
                let embedding = self
                    .embedder
                    .embed(question)
                    .with_context(|| format!("Failed to embed question with {}", model))?;
                self.store
                    .query(collection, QueryInput::Embedding(&embedding), self.n_results)?
            }
        };

        for m in &matches {
            debug!(
                "Retrieved {} (distance {:?}, source {:?})",
                m.id, m.distance, m.source
            );
        }
        Ok(matches)
    }

    /// Retrieve context for `question`, then stream the generated answer to `out`
    #[inline]
    pub fn ask<W: Write + ?Sized>(
        &self,
        question: &str,
        collection: &Collection,
        out: &mut W,
    ) -> Result<Answer> {
        let matches = self.retrieve(question, collection)?;
        info!(
            "Answering with {} chunks from {}",
            matches.len(),
            collection.name
        );

        let docs = matches
            .iter()
            .map(|m| m.document.as_str())
            .join(CONTEXT_SEPARATOR);
        let prompt = build_prompt(question, &docs);

        let fragments = self.generator.generate(&prompt)?;
        let bytes_written = write_fragments(fragments, out)?;

        Ok(Answer {
            question: question.to_string(),
            prompt,
            matches,
            bytes_written,
        })
    }
}
