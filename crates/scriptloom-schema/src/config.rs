use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_max_retries() -> u32 {
    3
}

fn default_generation_retry_limit() -> u32 {
    2
}

fn default_generation_timeout_secs() -> u64 {
    120
}

fn default_min_scene_chars() -> usize {
    300
}

fn default_max_scene_chars() -> usize {
    3200
}

fn default_lookback_chars() -> usize {
    200
}

fn default_top_k() -> usize {
    3
}

fn default_max_concurrent_episodes() -> usize {
    4
}

fn default_min_draft_chars() -> usize {
    1000
}

fn default_max_draft_chars() -> usize {
    1300
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> usize {
    1536
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "openai", "ollama" or "stub".
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "stub".to_string(),
            api_key: String::new(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: default_embedding_base_url(),
        }
    }
}

fn default_writer_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_writer_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_writer_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// "openai" for any OpenAI-compatible endpoint, or "stub".
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_writer_model")]
    pub model: String,
    #[serde(default = "default_writer_base_url")]
    pub base_url: String,
    #[serde(default = "default_writer_max_tokens")]
    pub max_tokens: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            provider: "stub".to_string(),
            api_key: String::new(),
            model: default_writer_model(),
            base_url: default_writer_base_url(),
            max_tokens: default_writer_max_tokens(),
        }
    }
}

/// Top-level run configuration. Every field has a default so a missing config
/// file means "run offline with stubs".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Content-quality rewrite budget per episode before escalation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Transient generation-failure budget per write attempt. Separate from
    /// `max_retries`: infra flakiness must not eat the rewrite budget.
    #[serde(default = "default_generation_retry_limit")]
    pub generation_retry_limit: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_min_scene_chars")]
    pub min_scene_chars: usize,
    #[serde(default = "default_max_scene_chars")]
    pub max_scene_chars: usize,
    /// How far the splitter looks back for a sentence terminator when a unit
    /// hits `max_scene_chars`.
    #[serde(default = "default_lookback_chars")]
    pub lookback_chars: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_concurrent_episodes")]
    pub max_concurrent_episodes: usize,
    #[serde(default = "default_min_draft_chars")]
    pub min_draft_chars: usize,
    #[serde(default = "default_max_draft_chars")]
    pub max_draft_chars: usize,
    /// Extra content-safety denylist entries, merged with the built-in list.
    #[serde(default)]
    pub denylist: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub writer: WriterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            generation_retry_limit: default_generation_retry_limit(),
            generation_timeout_secs: default_generation_timeout_secs(),
            min_scene_chars: default_min_scene_chars(),
            max_scene_chars: default_max_scene_chars(),
            lookback_chars: default_lookback_chars(),
            top_k: default_top_k(),
            max_concurrent_episodes: default_max_concurrent_episodes(),
            min_draft_chars: default_min_draft_chars(),
            max_draft_chars: default_max_draft_chars(),
            denylist: Vec::new(),
            output_dir: default_output_dir(),
            embedding: EmbeddingConfig::default(),
            writer: WriterConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.generation_retry_limit, 2);
        assert_eq!(config.min_scene_chars, 300);
        assert_eq!(config.max_scene_chars, 3200);
        assert_eq!(config.min_draft_chars, 1000);
        assert_eq!(config.max_draft_chars, 1300);
        assert_eq!(config.embedding.provider, "stub");
        assert_eq!(config.writer.provider, "stub");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: PipelineConfig =
            serde_yaml::from_str("max_retries: 5\nembedding:\n  provider: openai\n").unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.dimensions, 1536);
        assert_eq!(config.top_k, 3);
    }
}
