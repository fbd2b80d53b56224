#[cfg(test)]
mod tests;

use anyhow::Result;
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::config::ConfigError;

/// A window of consecutive sentences ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceChunk {
    /// Sentences of the window joined by single spaces
    pub text: String,
    /// Zero-based position of this chunk within its document
    pub chunk_index: usize,
    /// Index of the first sentence in the window
    pub first_sentence: usize,
    /// Number of sentences in the window
    pub sentence_count: usize,
}

/// Sentence windowing for chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Sentences per chunk
    pub sentences_per_chunk: usize,
    /// Sentences shared between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            sentences_per_chunk: 7,
            overlap: 0,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sentences_per_chunk == 0 {
            return Err(ConfigError::InvalidSentencesPerChunk(
                self.sentences_per_chunk,
            ));
        }
        if self.overlap >= self.sentences_per_chunk {
            return Err(ConfigError::OverlapTooLarge(
                self.overlap,
                self.sentences_per_chunk,
            ));
        }
        Ok(())
    }

    /// Distance between the first sentences of consecutive windows
    #[inline]
    pub fn step(&self) -> usize {
        self.sentences_per_chunk.saturating_sub(self.overlap).max(1)
    }

    /// Number of windows produced for a document of `sentence_count` sentences
    #[inline]
    pub fn expected_chunk_count(&self, sentence_count: usize) -> usize {
        if sentence_count == 0 {
            0
        } else if sentence_count <= self.overlap {
            1
        } else {
            (sentence_count - self.overlap).div_ceil(self.step())
        }
    }
}

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?]+["'”’)\]]*(?=\s)"#).expect("valid regex")
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Words that end in a period without ending the sentence
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "e.g", "i.e", "fig", "inc",
    "ltd", "co", "mt", "approx", "dept", "cf", "al",
];

/// Split text into sentences at `.`, `!` and `?` followed by whitespace.
///
/// Common abbreviations and single-letter initials other than `I` do not
/// end a sentence, nor does `No.` when a number follows it.
/// Whitespace inside each sentence is collapsed to single spaces.
#[inline]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_END.find_iter(text).flatten() {
        let before = text.get(start..boundary.start()).unwrap_or_default();
        let punctuation = boundary.as_str();
        let after = text.get(boundary.end()..).unwrap_or_default();
        if punctuation.starts_with('.') && is_abbreviation(before, after) {
            continue;
        }

        push_sentence(&mut sentences, text.get(start..boundary.end()));
        start = boundary.end();
    }

    push_sentence(&mut sentences, text.get(start..));
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: Option<&str>) {
    let Some(raw) = raw else {
        return;
    };
    let normalized = WHITESPACE.replace_all(raw.trim(), " ");
    if !normalized.is_empty() {
        sentences.push(normalized.into_owned());
    }
}

fn is_abbreviation(preceding: &str, following: &str) -> bool {
    let Some(word) = preceding.split_whitespace().last() else {
        return false;
    };
    let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());

    let mut chars = word.chars();
    if let (Some(first), None) = (chars.next(), chars.next()) {
        return first.is_alphabetic() && first.is_uppercase() && first != 'I';
    }

    let lowered = word.to_lowercase();
    if lowered == "no" {
        return following
            .trim_start()
            .starts_with(|c: char| c.is_ascii_digit());
    }
    ABBREVIATIONS.contains(&lowered.as_str())
}

/// Group sentences into windows of `sentences_per_chunk`, each starting
/// `sentences_per_chunk - overlap` sentences after the previous one.
#[inline]
pub fn window_sentences(
    sentences: &[String],
    config: &ChunkingConfig,
) -> Result<Vec<SentenceChunk>> {
    config.validate()?;

    let step = config.step();
    let mut chunks = Vec::with_capacity(config.expected_chunk_count(sentences.len()));
    let mut start = 0;

    while start < sentences.len() {
        let end = start
            .saturating_add(config.sentences_per_chunk)
            .min(sentences.len());
        let window = sentences.get(start..end).unwrap_or_default();

        chunks.push(SentenceChunk {
            text: window.join(" "),
            chunk_index: chunks.len(),
            first_sentence: start,
            sentence_count: window.len(),
        });

        if end == sentences.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Split a document into sentence windows
#[inline]
pub fn chunk_by_sentences(text: &str, config: &ChunkingConfig) -> Result<Vec<SentenceChunk>> {
    let sentences = split_sentences(text);
    let chunks = window_sentences(&sentences, config)?;

    debug!(
        "Chunked {} sentences into {} chunks ({} per chunk, overlap {})",
        sentences.len(),
        chunks.len(),
        config.sentences_per_chunk,
        config.overlap
    );

    Ok(chunks)
}
