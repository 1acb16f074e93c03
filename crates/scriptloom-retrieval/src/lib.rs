//! Dual-space retrieval: one vector index over novel scenes (content), one
//! over style samples, queried independently per episode and never mixed.

pub mod embedding;
pub mod index;

pub use embedding::{
    EmbeddingProvider, EmbeddingResult, OllamaEmbeddingProvider, OpenAiEmbeddingProvider,
    StubEmbeddingProvider,
};
pub use index::{DualIndex, ScoredUnit, VectorIndex};

use std::sync::Arc;

use anyhow::Result;
use scriptloom_schema::config::EmbeddingConfig;

/// Select an embedding provider from configuration. Unknown or unconfigured
/// providers fall back to the deterministic stub so the pipeline always runs.
pub fn embedding_provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "openai" => {
            anyhow::ensure!(
                !config.api_key.trim().is_empty(),
                "openai embedding provider requires an api_key"
            );
            Arc::new(OpenAiEmbeddingProvider::from_config(config))
        }
        "ollama" => Arc::new(OllamaEmbeddingProvider::from_config(config)),
        "stub" => Arc::new(StubEmbeddingProvider::new(64)),
        other => {
            tracing::warn!(provider = %other, "unknown embedding provider, using stub");
            Arc::new(StubEmbeddingProvider::new(64))
        }
    };
    Ok(provider)
}
