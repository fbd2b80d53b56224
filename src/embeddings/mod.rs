// Embeddings module
// Sentence chunking and the Ollama client for embeddings and generation

pub mod chunking;
pub mod ollama;

pub use chunking::{
    ChunkingConfig, SentenceChunk, chunk_by_sentences, split_sentences, window_sentences,
};
pub use ollama::{GenerationStream, OllamaClient};

use anyhow::Result;

/// Where chunk and question embeddings come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingSource {
    /// The vector store computes embeddings with its built-in function
    Internal,
    /// An Ollama embedding model
    Model(String),
}

impl EmbeddingSource {
    /// Setting value that selects the store's built-in embedding function
    pub const INTERNAL: &'static str = "internal";

    #[inline]
    pub fn from_setting(value: &str) -> Self {
        let value = value.trim();
        if value == Self::INTERNAL {
            Self::Internal
        } else {
            Self::Model(value.to_string())
        }
    }

    #[inline]
    pub fn model_name(&self) -> Option<&str> {
        match self {
            Self::Internal => None,
            Self::Model(name) => Some(name),
        }
    }
}

/// Turns text into an embedding vector
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
