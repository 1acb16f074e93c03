use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use scriptloom_schema::config::EmbeddingConfig;

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub dimensions: usize,
}

/// Embedding capability consumed by the vector index. Implementations must be
/// deterministic per input for a fixed model so index builds are repeatable.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult>;
    fn model_id(&self) -> &str;
    fn dimensions(&self) -> usize;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible provider
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimensions: usize,
    base_url: String,
}

impl OpenAiEmbeddingProvider {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            base_url: config.base_url.clone(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: Vec<String>,
    encoding_format: String,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
    model: String,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult {
                embeddings: Vec::new(),
                model: self.model.clone(),
                dimensions: self.dimensions,
            });
        }

        let endpoint = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let request = OpenAiEmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            encoding_format: "float".to_string(),
        };

        let response = self
            .client
            .post(endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let mut parsed: OpenAiEmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|item| item.index);

        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                parsed.data.len()
            ));
        }
        for (expected, item) in parsed.data.iter().enumerate() {
            if item.index != expected {
                return Err(anyhow!(
                    "missing or duplicated embedding index {expected}"
                ));
            }
        }

        let embeddings: Vec<Vec<f32>> =
            parsed.data.into_iter().map(|item| item.embedding).collect();
        if embeddings.iter().any(|e| e.len() != self.dimensions) {
            return Err(anyhow!(
                "embedding dimensions mismatch with configured dimensions {}",
                self.dimensions
            ));
        }

        Ok(EmbeddingResult {
            embeddings,
            model: parsed.model,
            dimensions: self.dimensions,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// Ollama provider
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    model: String,
    dimensions: usize,
    base_url: String,
}

impl OllamaEmbeddingProvider {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let base_url = if config.base_url.contains("openai.com") {
            "http://localhost:11434".to_string()
        } else {
            config.base_url.clone()
        };
        Self {
            client: reqwest::Client::new(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            base_url,
        }
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult {
                embeddings: Vec::new(),
                model: self.model.clone(),
                dimensions: self.dimensions,
            });
        }

        let endpoint = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(&endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let parsed: OllamaEmbeddingResponse = response.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                parsed.embeddings.len()
            ));
        }

        let dimensions = parsed
            .embeddings
            .first()
            .map(|e| e.len())
            .unwrap_or(self.dimensions);
        Ok(EmbeddingResult {
            embeddings: parsed.embeddings,
            model: self.model.clone(),
            dimensions,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// Deterministic stub (offline mode and tests)
// ---------------------------------------------------------------------------

/// Hash-derived pseudo-embeddings. Identical text always maps to an identical
/// vector, which is exactly the property the index round-trip contract needs;
/// there is no semantic meaning beyond that.
#[derive(Clone)]
pub struct StubEmbeddingProvider {
    dimensions: usize,
}

impl StubEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn component(text: &str, index: usize) -> f32 {
        let mut hasher = Sha256::new();
        hasher.update(index.to_le_bytes());
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        let raw = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        (raw as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings = texts
            .iter()
            .map(|text| {
                (0..self.dimensions)
                    .map(|index| Self::component(text, index))
                    .collect()
            })
            .collect();
        Ok(EmbeddingResult {
            embeddings,
            model: "stub".to_string(),
            dimensions: self.dimensions,
        })
    }

    fn model_id(&self) -> &str {
        "stub"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
