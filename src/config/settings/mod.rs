
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::EmbeddingSource;
use crate::embeddings::chunking::ChunkingConfig;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_COLLECTION: &str = "ma-rag-embeddings";
pub const DEFAULT_MANIFEST: &str = "sourcedocs.txt";
pub const DEFAULT_QUESTION: &str = "Who won the most recent payling prize award in Oviedo?";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Embedding model name, or `internal` to let the vector store embed
    #[serde(rename = "embedmodel")]
    pub embed_model: String,
    /// Generative model used to answer questions
    #[serde(rename = "mainmodel")]
    pub main_model: String,
    /// Timeout for embedding requests. Generation is never timed out.
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embed_model: "nomic-embed-text:latest".to_string(),
            main_model: "llama3.2:latest".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub tenant: String,
    pub database: String,
    pub collection: String,
    /// Timeout for every request to the vector store
    pub timeout_seconds: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 8000,
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    /// Manifest listing the documents to ingest, relative to the working directory
    pub manifest: PathBuf,
    /// Timeout for fetching `http(s)` sources listed in the manifest
    pub fetch_timeout_seconds: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            fetch_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    pub n_results: usize,
    pub default_question: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            n_results: 1,
            default_question: DEFAULT_QUESTION.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid generative model: {0} (must name an Ollama model)")]
    InvalidMainModel(String),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid collection name: {0:?} (must be 3-63 characters of [a-zA-Z0-9._-])")]
    InvalidCollection(String),
    #[error("Invalid {0}: value cannot be empty")]
    EmptyField(&'static str),
    #[error("Invalid sentences per chunk: {0} (must be at least 1)")]
    InvalidSentencesPerChunk(usize),
    #[error("Overlap ({0}) must be smaller than sentences per chunk ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid result count: {0} (must be between 1 and 100)")]
    InvalidResultCount(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.ragdocs`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".ragdocs"))
            .or_else(|| dirs::data_dir().map(|data| data.join("ragdocs")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when
    /// the file does not exist yet.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.vector_store.validate()?;
        self.chunking.validate()?;

        if !(1..=100).contains(&self.query.n_results) {
            return Err(ConfigError::InvalidResultCount(self.query.n_results));
        }
        if self.query.default_question.trim().is_empty() {
            return Err(ConfigError::EmptyField("default question"));
        }
        if self.ingest.manifest.as_os_str().is_empty() {
            return Err(ConfigError::EmptyField("manifest path"));
        }
        validate_timeout(self.ingest.fetch_timeout_seconds)?;

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn vector_store_url(&self) -> Result<Url, ConfigError> {
        self.vector_store.base_url()
    }

    /// How chunks and questions get their embeddings
    #[inline]
    pub fn embedding_source(&self) -> EmbeddingSource {
        EmbeddingSource::from_setting(&self.ollama.embed_model)
    }
}

fn validate_endpoint(protocol: &str, host: &str, port: u16) -> Result<Url, ConfigError> {
    if protocol != "http" && protocol != "https" {
        return Err(ConfigError::InvalidProtocol(protocol.to_string()));
    }

    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }

    let url_str = format!("{}://{}:{}", protocol, host, port);
    let url = Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str.clone()))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidUrl(url_str));
    }
    Ok(url)
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if (1..=600).contains(&seconds) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTimeout(seconds))
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)?;

        if self.embed_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embed_model.clone()));
        }

        // The store can embed documents, but it cannot answer questions
        if self.main_model.trim().is_empty() || self.main_model == EmbeddingSource::INTERNAL {
            return Err(ConfigError::InvalidMainModel(self.main_model.clone()));
        }

        validate_timeout(self.timeout_seconds)
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        validate_endpoint(&self.protocol, &host, self.port)?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embed_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embed_model = model;
        Ok(())
    }

    pub fn set_main_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() || model == EmbeddingSource::INTERNAL {
            return Err(ConfigError::InvalidMainModel(model));
        }
        self.main_model = model;
        Ok(())
    }
}

impl VectorStoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)?;

        if self.tenant.trim().is_empty() {
            return Err(ConfigError::EmptyField("tenant"));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::EmptyField("database"));
        }
        if !is_valid_collection_name(&self.collection) {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }

        validate_timeout(self.timeout_seconds)
    }

    /// Server root, e.g. `http://localhost:8000/`
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)
    }

    pub fn set_collection(&mut self, collection: String) -> Result<(), ConfigError> {
        if !is_valid_collection_name(&collection) {
            return Err(ConfigError::InvalidCollection(collection));
        }
        self.collection = collection;
        Ok(())
    }
}

/// Chroma accepts 3-63 characters of `[a-zA-Z0-9._-]`, starting and ending alphanumeric.
pub(crate) fn is_valid_collection_name(name: &str) -> bool {
    let len_ok = (3..=63).contains(&name.len());
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    let ends_ok = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());

    len_ok && chars_ok && ends_ok
}
