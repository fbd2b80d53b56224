
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use ureq::Body;
use ureq::http::Response;
use url::Url;

use super::{
    ChunkRecord, Collection, DistanceSpace, QueryInput, QueryMatch, SPACE_METADATA_KEY,
    VectorStore,
};
use crate::RagError;
use crate::config::VectorStoreConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Client for the Chroma HTTP API (v2)
#[derive(Debug, Clone)]
pub struct ChromaClient {
    base_url: Url,
    tenant: String,
    database: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    metadata: Map<String, Value>,
    get_or_create: bool,
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    ids: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    embeddings: Option<[&'a [f32]; 1]>,
    documents: [&'a str; 1],
    metadatas: [SourceMetadata<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SourceMetadata<'a> {
    source: &'a str,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    query_embeddings: Option<[&'a [f32]; 1]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_texts: Option<[&'a str; 1]>,
    n_results: usize,
    include: [&'static str; 3],
}

/// Column-oriented query result, one inner list per query
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl ChromaClient {
    /// Create a new client for the configured Chroma server
    ///
    /// # Arguments
    /// * `config` - Vector store section of the application configuration
    ///
    /// # Returns
    /// * `Result<Self, RagError>` - New client or error when the URL is invalid
    #[inline]
    pub fn new(config: &VectorStoreConfig) -> Result<Self, RagError> {
        let base_url = config
            .base_url()
            .map_err(|e| RagError::Config(format!("Invalid vector store URL: {}", e)))?;

        let timeout = if config.timeout_seconds == 0 {
            DEFAULT_TIMEOUT_SECONDS
        } else {
            config.timeout_seconds
        };

        Ok(Self {
            base_url,
            tenant: config.tenant.clone(),
            database: config.database.clone(),
            agent: build_agent(Duration::from_secs(timeout)),
        })
    }

    /// Check that the server is up
    #[inline]
    pub fn heartbeat(&self) -> Result<(), RagError> {
        let url = self.endpoint(&["api", "v2", "heartbeat"])?;
        debug!("Checking Chroma heartbeat at {}", url);

        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| transport_error(&url, &e))?;
        read_success_body(response)?;

        info!("Chroma server at {} is reachable", self.base_url);
        Ok(())
    }

    fn collections_url(&self, extra: &[&str]) -> Result<Url, RagError> {
        let mut segments = vec![
            "api",
            "v2",
            "tenants",
            self.tenant.as_str(),
            "databases",
            self.database.as_str(),
            "collections",
        ];
        segments.extend_from_slice(extra);
        self.endpoint(&segments)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RagError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RagError::Config(format!("Vector store URL cannot be a base: {}", self.base_url))
            })?
            .clear()
            .extend(segments);
        Ok(url)
    }

    fn post_json<T: Serialize>(&self, url: &Url, body: &T) -> Result<String, RagError> {
        let request_json = serde_json::to_string(body)
            .map_err(|e| RagError::VectorStore(format!("Failed to serialize request: {}", e)))?;

        let response = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| transport_error(url, &e))?;

        read_success_body(response)
    }
}

impl VectorStore for ChromaClient {
    #[inline]
    fn list_collections(&self) -> Result<Vec<Collection>, RagError> {
        let url = self.collections_url(&[])?;
        debug!("Listing collections at {}", url);

        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| transport_error(&url, &e))?;
        let body = read_success_body(response)?;

        let collections: Vec<Collection> = serde_json::from_str(&body).map_err(|e| {
            RagError::VectorStore(format!("Failed to parse collection list: {}", e))
        })?;

        debug!("Found {} collections", collections.len());
        Ok(collections)
    }

    #[inline]
    fn delete_collection(&self, name: &str) -> Result<(), RagError> {
        let url = self.collections_url(&[name])?;
        info!("Deleting collection {}", name);

        let response = self
            .agent
            .delete(url.as_str())
            .call()
            .map_err(|e| transport_error(&url, &e))?;
        read_success_body(response)?;

        Ok(())
    }

    #[inline]
    fn get_or_create_collection(
        &self,
        name: &str,
        space: DistanceSpace,
    ) -> Result<Collection, RagError> {
        let url = self.collections_url(&[])?;

        let mut metadata = Map::new();
        metadata.insert(
            SPACE_METADATA_KEY.to_string(),
            Value::String(space.as_str().to_string()),
        );

        let body = self.post_json(
            &url,
            &CreateCollectionRequest {
                name,
                metadata,
                get_or_create: true,
            },
        )?;

        let collection: Collection = serde_json::from_str(&body)
            .map_err(|e| RagError::VectorStore(format!("Failed to parse collection: {}", e)))?;

        debug!(
            "Using collection {} ({}) with {} space",
            collection.name,
            collection.id,
            space.as_str()
        );
        Ok(collection)
    }

    #[inline]
    fn add(&self, collection: &Collection, record: &ChunkRecord) -> Result<(), RagError> {
        // Upsert so re-ingesting a file replaces its chunks instead of being ignored
        let url = self.collections_url(&[collection.id.as_str(), "upsert"])?;

        let request = AddRequest {
            ids: [record.id.as_str()],
            embeddings: record.embedding.as_deref().map(|embedding| [embedding]),
            documents: [record.document.as_str()],
            metadatas: [SourceMetadata {
                source: record.source.as_str(),
            }],
        };

        self.post_json(&url, &request)?;
        debug!("Added chunk {} to {}", record.id, collection.name);
        Ok(())
    }

    #[inline]
    fn query(
        &self,
        collection: &Collection,
        input: QueryInput<'_>,
        n_results: usize,
    ) -> Result<Vec<QueryMatch>, RagError> {
        let url = self.collections_url(&[collection.id.as_str(), "query"])?;

        let (query_embeddings, query_texts) = match input {
            QueryInput::Embedding(embedding) => (Some([embedding]), None),
            QueryInput::Text(text) => (None, Some([text])),
        };

        let request = QueryRequest {
            query_embeddings,
            query_texts,
            n_results,
            include: ["documents", "metadatas", "distances"],
        };

        let body = self.post_json(&url, &request)?;
        let response: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::VectorStore(format!("Failed to parse query result: {}", e)))?;

        let matches = first_query_matches(response);
        debug!(
            "Query against {} returned {} matches",
            collection.name,
            matches.len()
        );
        Ok(matches)
    }

    #[inline]
    fn count(&self, collection: &Collection) -> Result<usize, RagError> {
        let url = self.collections_url(&[collection.id.as_str(), "count"])?;

        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| transport_error(&url, &e))?;
        let body = read_success_body(response)?;

        body.trim()
            .parse()
            .map_err(|e| RagError::VectorStore(format!("Failed to parse count {:?}: {}", body, e)))
    }
}

/// Zip the column lists of the first (and only) query into matches
fn first_query_matches(response: QueryResponse) -> Vec<QueryMatch> {
    let QueryResponse {
        ids,
        documents,
        metadatas,
        distances,
    } = response;

    let ids = ids.into_iter().next().unwrap_or_default();
    let mut documents = documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut distances = distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default()
        .into_iter();

    ids.into_iter()
        .map(|id| {
            let source = metadatas
                .next()
                .flatten()
                .and_then(|m| m.get("source").and_then(Value::as_str).map(str::to_string));
            QueryMatch {
                id,
                document: documents.next().flatten().unwrap_or_default(),
                source,
                distance: distances.next().flatten(),
            }
        })
        .collect()
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn transport_error(url: &Url, error: &ureq::Error) -> RagError {
    warn!("Request to {} failed: {}", url, error);
    RagError::VectorStore(format!("Failed to reach vector store at {}: {}", url, error))
}

fn read_success_body(mut response: Response<Body>) -> Result<String, RagError> {
    let status = response.status();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| RagError::VectorStore(format!("Failed to read response body: {}", e)))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(RagError::VectorStore(format!(
            "HTTP {}: {}",
            status.as_u16(),
            error_message(&body)
        )))
    }
}

/// Chroma reports failures as `{"error": ..., "message": ...}`
fn error_message(body: &str) -> String {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    ["message", "error"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .map_or_else(|| body.trim().to_string(), str::to_string)
}
