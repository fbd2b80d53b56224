
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Lines, Read};
use std::time::Duration;
use tracing::{debug, info, warn};
use ureq::{Body, BodyReader};
use ureq::http::Response;
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::Embedder;
use crate::query::Generator;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embed_model: String,
    main_model: String,
    agent: ureq::Agent,
    stream_agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line of a streaming `/api/generate` response
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn build_agent(timeout: Option<Duration>) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(timeout)
        .http_status_as_error(false)
        .build()
        .into()
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let timeout = if config.timeout_seconds == 0 {
            DEFAULT_TIMEOUT_SECONDS
        } else {
            config.timeout_seconds
        };

        Ok(Self {
            base_url,
            embed_model: config.embed_model.clone(),
            main_model: config.main_model.clone(),
            agent: build_agent(Some(Duration::from_secs(timeout))),
            stream_agent: build_agent(None),
        })
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test connection to the Ollama server and verify both models are available
    #[inline]
    pub fn health_check(&self, check_embed_model: bool) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();

        let mut wanted = vec![self.main_model.as_str()];
        if check_embed_model {
            wanted.push(self.embed_model.as_str());
        }

        for model in wanted {
            if !model_available(&names, model) {
                warn!("Model {} not found. Available models: {:?}", model, names);
                bail!(
                    "Model '{}' is not available. Available models: {:?}",
                    model,
                    names
                );
            }
        }

        info!("Health check passed for Ollama server at {}", self.base_url);
        Ok(())
    }

    /// List all models installed on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| transport_error(&url, &e))?;
        let response_text = read_success_body(response)?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate an embedding for a single text with the configured embedding model
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.embed_model,
            prompt: text,
        };

        let url = self
            .base_url
            .join("/api/embeddings")
            .context("Failed to build embedding URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let response = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| transport_error(&url, &e))?;
        let response_text = read_success_body(response).context("Failed to generate embedding")?;

        let embed_response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        if embed_response.embedding.is_empty() {
            bail!(
                "Model '{}' returned an empty embedding; is it an embedding model?",
                self.embed_model
            );
        }

        debug!(
            "Generated embedding with {} dimensions",
            embed_response.embedding.len()
        );

        Ok(embed_response.embedding)
    }

    /// Start a streaming completion with the configured main model
    #[inline]
    pub fn generate_stream(&self, prompt: &str) -> Result<GenerationStream<BodyReader<'static>>> {
        debug!(
            "Requesting streamed generation from {} (prompt length: {})",
            self.main_model,
            prompt.len()
        );

        let request = GenerateRequest {
            model: &self.main_model,
            prompt,
            stream: true,
        };

        let url = self
            .base_url
            .join("/api/generate")
            .context("Failed to build generate URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize generate request")?;

        let mut response = self
            .stream_agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| transport_error(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            bail!(
                "Generation failed with HTTP {}: {}",
                status.as_u16(),
                error_message(&body)
            );
        }

        Ok(GenerationStream::new(response.into_body().into_reader()))
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_embedding(text)
    }
}

impl Generator for OllamaClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        Ok(Box::new(self.generate_stream(prompt)?))
    }
}

/// Response fragments of a streaming generation, in arrival order.
///
/// Reads one NDJSON object per line and stops after the object marked `done`
/// or at end of input.
pub struct GenerationStream<R> {
    lines: Lines<BufReader<R>>,
    finished: bool,
}

impl<R: Read> GenerationStream<R> {
    #[inline]
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            finished: false,
        }
    }
}

impl<R: Read> Iterator for GenerationStream<R> {
    type Item = Result<String>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(anyhow!(e).context("Failed to read generation stream")));
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let chunk: GenerateChunk = match serde_json::from_str(&line) {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(
                        anyhow!(e).context(format!("Malformed generation chunk: {line}"))
                    ));
                }
            };

            if let Some(error) = chunk.error {
                self.finished = true;
                return Some(Err(anyhow!("Ollama generation failed: {error}")));
            }

            if chunk.done {
                self.finished = true;
            }
            return Some(Ok(chunk.response));
        }
    }
}

fn model_available(names: &[&str], model: &str) -> bool {
    // Ollama lists untagged models as `name:latest`
    names
        .iter()
        .any(|name| *name == model || (!model.contains(':') && *name == format!("{model}:latest")))
}

fn transport_error(url: &Url, error: &ureq::Error) -> anyhow::Error {
    warn!("Request to {} failed: {}", url, error);
    anyhow!("Failed to reach Ollama at {}: {}", url, error)
}

fn read_success_body(mut response: Response<Body>) -> Result<String> {
    let status = response.status();
    let body = response
        .body_mut()
        .read_to_string()
        .context("Failed to read Ollama response body")?;

    if status.is_success() {
        Ok(body)
    } else if status.is_server_error() {
        Err(anyhow!(
            "Server error: HTTP {}: {}",
            status.as_u16(),
            error_message(&body)
        ))
    } else {
        Err(anyhow!(
            "Client error: HTTP {}: {}",
            status.as_u16(),
            error_message(&body)
        ))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_string())
}
