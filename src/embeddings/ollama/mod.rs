
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::VectorsError;
use crate::config::OllamaConfig;
use crate::embeddings::Embedder;
use crate::store::run_blocking;

/// Vector size of the default `nomic-embed-text` model
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const FIRST_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Blocking client for an Ollama server's embedding API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

/// What to do after a failed HTTP call
#[derive(Debug, PartialEq, Eq)]
enum Failure {
    /// Server-side or transport trouble that may go away
    Transient,
    /// The request itself is wrong; repeating it cannot help
    Permanent,
}

fn classify(error: &ureq::Error) -> Failure {
    match error {
        ureq::Error::StatusCode(status) if *status >= 500 => Failure::Transient,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => Failure::Transient,
        _ => Failure::Permanent,
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.url().context("Invalid Ollama address")?,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            agent: build_agent(DEFAULT_TIMEOUT),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Total tries per request, at least one
    #[inline]
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fail unless the server is up and has the configured model pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let models = self
            .list_models()
            .with_context(|| format!("Ollama at {} is unreachable", self.base_url))?;

        if models.iter().all(|m| m.name != self.model) {
            let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!("Model {} missing from {:?}", self.model, available);
            bail!(
                "Model '{}' is not pulled on {} (have: {})",
                self.model,
                self.base_url,
                available.join(", ")
            );
        }

        info!("Ollama at {} serves {}", self.base_url, self.model);
        Ok(())
    }

    /// Models the server has available, from `GET /api/tags`
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let tags: TagsResponse = self.get_json("/api/tags")?;
        debug!("Ollama lists {} models", tags.models.len());
        Ok(tags.models)
    }

    /// Embed `texts` in requests of at most `batch_size` inputs
    #[inline]
    pub fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (number, batch) in texts.chunks(self.batch_size as usize).enumerate() {
            debug!("Embedding batch {} ({} texts)", number, batch.len());
            let response: EmbedResponse = self
                .post_json(
                    "/api/embed",
                    &EmbedRequest {
                        model: &self.model,
                        input: batch,
                    },
                )
                .with_context(|| format!("Embedding batch {} failed", number))?;

            if response.embeddings.len() != batch.len() {
                bail!(
                    "Ollama returned {} embeddings for {} inputs",
                    response.embeddings.len(),
                    batch.len()
                );
            }
            vectors.extend(response.embeddings);
        }
        Ok(vectors)
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = self.base_url.join(endpoint)?;
        let body = self.call_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        serde_json::from_str(&body).with_context(|| format!("Unexpected reply from {}", url))
    }

    fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        request: &B,
    ) -> Result<T> {
        let url = self.base_url.join(endpoint)?;
        let payload = serde_json::to_string(request)?;
        let body = self.call_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(payload.as_str())
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        serde_json::from_str(&body).with_context(|| format!("Unexpected reply from {}", url))
    }

    /// Run `call`, retrying transient failures with doubling delays
    fn call_with_retry<F>(&self, mut call: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut delay = FIRST_RETRY_DELAY;
        let mut attempt = 1;
        loop {
            let error = match call() {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            if classify(&error) == Failure::Permanent {
                warn!("Ollama request rejected: {}", error);
                return Err(anyhow!("Ollama rejected the request: {}", error));
            }
            if attempt >= self.retry_attempts {
                error!(
                    "Giving up on {} after {} attempts: {}",
                    self.base_url, attempt, error
                );
                return Err(anyhow!("Ollama request failed after {} attempts: {}", attempt, error));
            }

            warn!(
                "Ollama request failed ({}), retry {}/{} in {:?}",
                error, attempt, self.retry_attempts, delay
            );
            thread::sleep(delay);
            delay *= 2;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    #[inline]
    async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| VectorsError::Embedding("Ollama returned no embedding".to_string()))
    }

    #[inline]
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        let client = self.clone();
        let texts = texts.to_vec();
        run_blocking(move || {
            client
                .generate_embeddings(&texts)
                .map_err(|e| VectorsError::Embedding(format!("{:#}", e)))
        })
        .await
    }
}
