//! Generation-agent capability.
//!
//! The engine depends only on [`DraftProvider`]; which backend actually
//! writes the prose is wiring. The stub renders deterministic, format-valid
//! drafts from retrieved material so the whole pipeline runs offline.

pub mod openai;
pub mod prompt;
pub mod stub;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use scriptloom_schema::config::WriterConfig;
use scriptloom_schema::{EpisodeSpec, RewriteDirective};

pub use openai::OpenAiDraftProvider;
pub use stub::StubDraftProvider;

/// Everything a writer needs for one attempt at one episode: the resolved
/// brief, the two retrieval result sets (kept separate), and the structured
/// rewrite directive when this is a rework pass.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub spec: EpisodeSpec,
    pub content_passages: Vec<String>,
    pub style_passages: Vec<String>,
    pub directive: Option<RewriteDirective>,
}

#[derive(Debug, Clone)]
pub struct DraftResponse {
    pub text: String,
}

#[async_trait]
pub trait DraftProvider: Send + Sync {
    async fn draft(&self, request: DraftRequest) -> Result<DraftResponse>;

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

/// Select a draft provider from configuration. "stub" (and anything unknown)
/// resolves to the offline renderer.
pub fn draft_provider_from_config(
    config: &WriterConfig,
    draft_band: (usize, usize),
) -> Result<Arc<dyn DraftProvider>> {
    let provider: Arc<dyn DraftProvider> = match config.provider.as_str() {
        "openai" => {
            anyhow::ensure!(
                !config.api_key.trim().is_empty(),
                "openai writer provider requires an api_key"
            );
            Arc::new(OpenAiDraftProvider::from_config(config))
        }
        "stub" => Arc::new(StubDraftProvider::new(draft_band.0, draft_band.1)),
        other => {
            tracing::warn!(provider = %other, "unknown writer provider, using stub");
            Arc::new(StubDraftProvider::new(draft_band.0, draft_band.1))
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_writer_falls_back_to_stub() {
        let config = WriterConfig {
            provider: "mystery".into(),
            ..WriterConfig::default()
        };
        assert!(draft_provider_from_config(&config, (100, 200)).is_ok());
    }

    #[test]
    fn openai_writer_requires_key() {
        let config = WriterConfig {
            provider: "openai".into(),
            ..WriterConfig::default()
        };
        assert!(draft_provider_from_config(&config, (100, 200)).is_err());
    }
}
