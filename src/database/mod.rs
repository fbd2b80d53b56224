// Database module
// Vector store abstraction and the Chroma HTTP client behind it

pub mod chroma;

#[cfg(test)]
pub(crate) mod fake;

pub use chroma::ChromaClient;

use serde::{Deserialize, Serialize};

use crate::RagError;

/// Metadata key Chroma reads the distance function from
pub const SPACE_METADATA_KEY: &str = "hnsw:space";

/// A named collection on the vector store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

/// Distance function a collection ranks neighbours by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceSpace {
    Cosine,
}

impl DistanceSpace {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
        }
    }
}

/// One chunk as written to a collection
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Source filename followed by the chunk index, e.g. `doc.txt0`
    pub id: String,
    /// Raw chunk text
    pub document: String,
    /// Originating file path, stored as `source` metadata
    pub source: String,
    /// Absent when the store computes the embedding itself
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    #[inline]
    pub fn chunk_id(filename: &str, chunk_index: usize) -> String {
        format!("{filename}{chunk_index}")
    }
}

/// What a similarity query is matched against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryInput<'a> {
    /// A precomputed query embedding
    Embedding(&'a [f32]),
    /// Raw text, embedded by the store's own embedding function
    Text(&'a str),
}

/// A stored chunk returned by a similarity query, nearest first
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub source: Option<String>,
    pub distance: Option<f32>,
}

/// Collection operations the pipeline needs from a vector database
pub trait VectorStore {
    fn list_collections(&self) -> Result<Vec<Collection>, RagError>;

    fn delete_collection(&self, name: &str) -> Result<(), RagError>;

    fn get_or_create_collection(
        &self,
        name: &str,
        space: DistanceSpace,
    ) -> Result<Collection, RagError>;

    /// Store a chunk, replacing any chunk already stored under the same id
    fn add(&self, collection: &Collection, record: &ChunkRecord) -> Result<(), RagError>;

    fn query(
        &self,
        collection: &Collection,
        input: QueryInput<'_>,
        n_results: usize,
    ) -> Result<Vec<QueryMatch>, RagError>;

    fn count(&self, collection: &Collection) -> Result<usize, RagError>;

    /// The collection named `name`, if it exists
    #[inline]
    fn find_collection(&self, name: &str) -> Result<Option<Collection>, RagError> {
        Ok(self
            .list_collections()?
            .into_iter()
            .find(|c| c.name == name))
    }

    /// Whether a collection named `name` exists
    #[inline]
    fn has_collection(&self, name: &str) -> Result<bool, RagError> {
        Ok(self.find_collection(name)?.is_some())
    }
}
