//! Drives one episode through the state machine. All capability calls
//! (retrieval queries, writer invocations) happen here; routing stays in
//! [`crate::stage::advance`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use scriptloom_provider::{DraftProvider, DraftRequest};
use scriptloom_retrieval::DualIndex;
use scriptloom_schema::{EpisodeSpec, EpisodeState, RewriteDirective};
use scriptloom_validator::Validator;

use crate::stage::{advance, empty_draft_report, Stage, StageEvent};
use crate::{delivery, review, EngineConfig};

#[derive(Clone)]
pub struct EpisodeRunner {
    pub(crate) index: Arc<DualIndex>,
    pub(crate) provider: Arc<dyn DraftProvider>,
    pub(crate) validator: Arc<Validator>,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) cancel: CancellationToken,
}

impl EpisodeRunner {
    /// Run the episode to a terminal stage, or stop after the current node if
    /// the run was cancelled. Episode-local failures never escape: the
    /// returned state carries the outcome either way.
    pub async fn run(&self, spec: EpisodeSpec) -> EpisodeState {
        let episode = spec.episode_number;
        let mut state = EpisodeState::new(spec);
        let mut stage = Stage::Plan;
        let mut content_passages: Vec<String> = Vec::new();
        let mut style_passages: Vec<String> = Vec::new();
        let mut directive: Option<RewriteDirective> = None;
        let max_retries = self.config.max_retries;

        loop {
            if stage.is_terminal() {
                break;
            }
            if self.cancel.is_cancelled() {
                tracing::info!(episode, ?stage, "cancelled; stopping after current node");
                break;
            }

            stage = match stage {
                Stage::Plan => {
                    tracing::debug!(episode, title = %state.spec.title, "episode planned");
                    advance(stage, &mut state, StageEvent::Planned, max_retries)
                }
                Stage::Retrieve => {
                    content_passages = self
                        .query_space("content", &state.spec.rag_query, episode)
                        .await;
                    style_passages = self
                        .query_space("style", &state.spec.style_query, episode)
                        .await;
                    advance(stage, &mut state, StageEvent::Retrieved, max_retries)
                }
                Stage::Write => {
                    let attempt = state.retry_count + 1;
                    let request = DraftRequest {
                        spec: state.spec.clone(),
                        content_passages: content_passages.clone(),
                        style_passages: style_passages.clone(),
                        directive: directive.clone(),
                    };
                    state.current_draft = self.generate(request, episode, attempt).await;
                    advance(stage, &mut state, StageEvent::Drafted, max_retries)
                }
                Stage::Validate => {
                    let report = match state.current_draft.as_deref() {
                        Some(draft) if !draft.trim().is_empty() => {
                            self.validator.validate(draft)
                        }
                        _ => empty_draft_report(),
                    };
                    tracing::info!(
                        episode,
                        attempt = state.retry_count + 1,
                        passed = report.passed,
                        violations = report.violations.len(),
                        "draft validated"
                    );
                    advance(stage, &mut state, StageEvent::Validated(report), max_retries)
                }
                Stage::Review => {
                    let report = state
                        .validation_report
                        .clone()
                        .unwrap_or_else(empty_draft_report);
                    directive = Some(review::directive_from_report(episode, &report));
                    advance(stage, &mut state, StageEvent::Reviewed, max_retries)
                }
                Stage::Deliver | Stage::Escalated => unreachable!("terminal stages break above"),
            };
        }

        state
    }

    /// Query one retrieval space, degrading to an empty result set on failure
    /// so the pipeline never stalls on retrieval.
    async fn query_space(&self, space: &str, query: &str, episode: u32) -> Vec<String> {
        let result = match space {
            "style" => self.index.query_style(query, self.config.top_k).await,
            _ => self.index.query_content(query, self.config.top_k).await,
        };
        match result {
            Ok(scored) => scored.into_iter().map(|s| s.unit.text).collect(),
            Err(error) => {
                tracing::warn!(episode, space, %error, "retrieval failed; using empty result set");
                Vec::new()
            }
        }
    }

    /// One write attempt: transient writer failures (errors, timeouts) are
    /// retried up to the generation budget; an empty draft is final for this
    /// attempt and is not retried.
    async fn generate(&self, request: DraftRequest, episode: u32, attempt: u32) -> Option<String> {
        let timeout = Duration::from_secs(self.config.generation_timeout_secs);
        for try_number in 0..=self.config.generation_retry_limit {
            match tokio::time::timeout(timeout, self.provider.draft(request.clone())).await {
                Ok(Ok(response)) => {
                    if response.text.trim().is_empty() {
                        tracing::warn!(episode, attempt, "writer returned an empty draft");
                        return None;
                    }
                    return Some(response.text);
                }
                Ok(Err(error)) => {
                    tracing::warn!(episode, attempt, try_number, %error, "writer call failed");
                }
                Err(_) => {
                    tracing::warn!(
                        episode,
                        attempt,
                        try_number,
                        timeout_secs = self.config.generation_timeout_secs,
                        "writer call timed out"
                    );
                }
            }
        }
        tracing::warn!(episode, attempt, "generation retries exhausted");
        None
    }

    /// Persist whatever the terminal state has to offer.
    pub async fn deliver(&self, state: &EpisodeState) -> Option<std::path::PathBuf> {
        match delivery::persist_episode(&self.config.output_dir, state).await {
            Ok(path) => path,
            Err(error) => {
                tracing::error!(
                    episode = state.spec.episode_number,
                    %error,
                    "failed to persist episode artifact"
                );
                None
            }
        }
    }
}
