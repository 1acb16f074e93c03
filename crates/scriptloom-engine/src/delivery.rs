//! Artifact persistence: one screenplay file per episode plus the run
//! summary record.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scriptloom_schema::{EpisodeState, RunSummary};

/// Best-effort text for an episode: the current draft, else the last
/// non-empty attempt from history.
pub fn deliverable_text(state: &EpisodeState) -> Option<&str> {
    state
        .current_draft
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .or_else(|| {
            state
                .history
                .iter()
                .rev()
                .map(|attempt| attempt.draft.as_str())
                .find(|d| !d.trim().is_empty())
        })
}

/// Write the episode's screenplay file. Returns `None` when no attempt ever
/// produced text worth keeping.
pub async fn persist_episode(output_dir: &Path, state: &EpisodeState) -> Result<Option<PathBuf>> {
    let Some(text) = deliverable_text(state) else {
        return Ok(None);
    };
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create output dir {}", output_dir.display()))?;
    let path = output_dir.join(format!("episode_{:03}.md", state.spec.episode_number));
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path))
}

pub async fn persist_summary(output_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create output dir {}", output_dir.display()))?;
    let path = output_dir.join("run_summary.json");
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
