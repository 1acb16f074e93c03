//! Workflow engine: sequences Plan -> Retrieve -> Write -> Validate ->
//! Review -> Deliver per episode, owns the retry budgets, and fans episodes
//! out as independent workers over the shared read-only indices.

pub mod delivery;
pub mod review;
pub mod runner;
pub mod stage;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use scriptloom_provider::DraftProvider;
use scriptloom_retrieval::DualIndex;
use scriptloom_schema::{
    Blueprint, EpisodeOutcome, EpisodeState, EpisodeStatus, PipelineConfig, RunSummary,
};
use scriptloom_validator::Validator;

pub use stage::{advance, empty_draft_report, Stage, StageEvent};

use runner::EpisodeRunner;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub generation_retry_limit: u32,
    pub generation_timeout_secs: u64,
    pub top_k: usize,
    pub max_concurrent_episodes: usize,
    pub output_dir: PathBuf,
}

impl EngineConfig {
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            generation_retry_limit: config.generation_retry_limit,
            generation_timeout_secs: config.generation_timeout_secs,
            top_k: config.top_k.max(1),
            max_concurrent_episodes: config.max_concurrent_episodes.max(1),
            output_dir: config.output_dir.clone(),
        }
    }
}

pub struct Engine {
    runner: EpisodeRunner,
    cancel: CancellationToken,
    config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(
        index: Arc<DualIndex>,
        provider: Arc<dyn DraftProvider>,
        validator: Arc<Validator>,
        config: EngineConfig,
    ) -> Self {
        let config = Arc::new(config);
        let cancel = CancellationToken::new();
        Self {
            runner: EpisodeRunner {
                index,
                provider,
                validator,
                config: Arc::clone(&config),
                cancel: cancel.clone(),
            },
            cancel,
            config,
        }
    }

    /// Token for run-level cancellation: no new episodes start once
    /// cancelled, and in-flight episodes stop after their current node.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process every blueprint episode, in parallel up to the configured
    /// limit. A single episode's escalation never aborts the run; the
    /// returned summary enumerates every episode's terminal status.
    pub async fn run(&self, blueprint: &Blueprint) -> Result<RunSummary> {
        let specs = blueprint.episode_specs();
        let started_at = Utc::now();
        tracing::info!(episodes = specs.len(), "starting adaptation run");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_episodes));
        let mut join_set: JoinSet<(u32, EpisodeState, Option<PathBuf>)> = JoinSet::new();

        for spec in &specs {
            if self.cancel.is_cancelled() {
                tracing::info!("cancellation requested; not starting further episodes");
                break;
            }
            let runner = self.runner.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let spec = spec.clone();
            join_set.spawn(async move {
                let episode = spec.episode_number;
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                if cancel.is_cancelled() {
                    return (episode, EpisodeState::new(spec), None);
                }
                let state = runner.run(spec).await;
                let artifact = if state.status.is_terminal() {
                    runner.deliver(&state).await
                } else {
                    None
                };
                (episode, state, artifact)
            });
        }

        let mut finished: HashMap<u32, EpisodeOutcome> = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((episode, state, artifact)) => {
                    finished.insert(
                        episode,
                        EpisodeOutcome {
                            episode_number: episode,
                            title: state.spec.title.clone(),
                            status: state.status,
                            retry_count: state.retry_count,
                            artifact_path: artifact,
                            escalated: state.status == EpisodeStatus::Escalated,
                        },
                    );
                }
                Err(error) => {
                    tracing::error!(%error, "episode worker panicked");
                }
            }
        }

        // Episodes that never started (cancellation, worker loss) still get a
        // line in the summary.
        let mut episodes: Vec<EpisodeOutcome> = specs
            .iter()
            .map(|spec| {
                finished
                    .remove(&spec.episode_number)
                    .unwrap_or_else(|| EpisodeOutcome {
                        episode_number: spec.episode_number,
                        title: spec.title.clone(),
                        status: EpisodeStatus::Pending,
                        retry_count: 0,
                        artifact_path: None,
                        escalated: false,
                    })
            })
            .collect();
        episodes.sort_by_key(|outcome| outcome.episode_number);

        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            episodes,
        };
        let summary_path = delivery::persist_summary(&self.config.output_dir, &summary).await?;
        tracing::info!(
            approved = summary.approved_count(),
            escalated = summary.escalated_count(),
            summary = %summary_path.display(),
            "run finished"
        );
        Ok(summary)
    }
}
