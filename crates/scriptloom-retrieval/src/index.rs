use std::sync::Arc;

use anyhow::{bail, Result};
use scriptloom_schema::SceneUnit;

use crate::embedding::EmbeddingProvider;

/// One retrieved unit with its similarity score in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: SceneUnit,
    pub score: f32,
}

/// A single immutable vector space. Built once over a corpus; building again
/// produces a fresh index, never an incremental merge. Queries take `&self`
/// and are safe to issue from any number of tasks concurrently.
pub struct VectorIndex {
    label: String,
    units: Vec<SceneUnit>,
    vectors: Vec<Vec<f32>>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl VectorIndex {
    pub async fn build(
        label: impl Into<String>,
        units: Vec<SceneUnit>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let label = label.into();
        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let result = provider.embed(&texts).await?;
        if result.embeddings.len() != units.len() {
            bail!(
                "index build for '{label}': embedding count mismatch (expected {}, got {})",
                units.len(),
                result.embeddings.len()
            );
        }
        tracing::info!(
            space = %label,
            units = units.len(),
            model = %result.model,
            "built vector index"
        );
        Ok(Self {
            label,
            units,
            vectors: result.embeddings,
            provider,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Top-k most similar units, sorted by descending score with ties broken
    /// by original unit order. Returns fewer than `top_k` results only when
    /// the index holds fewer units. A blank query matches nothing.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredUnit>> {
        if top_k == 0 {
            bail!("top_k must be at least 1");
        }
        if text.trim().is_empty() || self.units.is_empty() {
            return Ok(Vec::new());
        }

        let embedded = self.provider.embed(&[text.to_owned()]).await?;
        let query_vector = embedded
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedding provider returned no query vector"))?;

        let mut ranked: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vector)| (idx, cosine_similarity(&query_vector, vector)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(top_k);

        Ok(ranked
            .into_iter()
            .map(|(idx, score)| ScoredUnit {
                unit: self.units[idx].clone(),
                score,
            })
            .collect())
    }
}

/// The two retrieval spaces, one per corpus. A query never spans both.
pub struct DualIndex {
    content: VectorIndex,
    style: VectorIndex,
}

impl DualIndex {
    /// Build both spaces. An empty content corpus is a build error — no
    /// episode could retrieve against it — while an empty style corpus is
    /// allowed and simply yields empty style results.
    pub async fn build(
        content_units: Vec<SceneUnit>,
        style_units: Vec<SceneUnit>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        if content_units.is_empty() {
            bail!("content corpus produced no scene units; nothing to retrieve against");
        }
        if style_units.is_empty() {
            tracing::warn!("style corpus is empty; style retrieval will return no samples");
        }
        let content = VectorIndex::build("content", content_units, Arc::clone(&provider)).await?;
        let style = VectorIndex::build("style", style_units, provider).await?;
        Ok(Self { content, style })
    }

    pub fn content(&self) -> &VectorIndex {
        &self.content
    }

    pub fn style(&self) -> &VectorIndex {
        &self.style
    }

    pub async fn query_content(&self, text: &str, top_k: usize) -> Result<Vec<ScoredUnit>> {
        self.content.query(text, top_k).await
    }

    pub async fn query_style(&self, text: &str, top_k: usize) -> Result<Vec<ScoredUnit>> {
        self.style.query(text, top_k).await
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}
