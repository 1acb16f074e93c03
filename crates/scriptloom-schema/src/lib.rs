use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod config;

pub use config::PipelineConfig;

/// A narratively coherent contiguous span of source text, emitted once by the
/// splitter and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneUnit {
    pub id: String,
    /// Byte offset of the unit's first character in the source text.
    pub start: usize,
    /// Byte offset one past the unit's last character.
    pub end: usize,
    pub text: String,
    /// Best-effort location tag from narrative cues, when one was detected.
    #[serde(default)]
    pub location: Option<String>,
    /// Speaker names detected in dialogue lines. Best-effort, not exhaustive.
    #[serde(default)]
    pub characters: BTreeSet<String>,
    /// Length in Unicode scalar values, not bytes.
    pub char_count: usize,
}

/// One episode-level writing assignment resolved from the blueprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpisodeSpec {
    pub episode_number: u32,
    pub title: String,
    pub summary: String,
    pub rag_query: String,
    pub style_query: String,
}

/// Raw blueprint entry as authored. Field fallbacks are resolved into an
/// [`EpisodeSpec`] by [`Blueprint::episode_specs`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawEpisode {
    #[serde(default)]
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub beats: Option<String>,
    #[serde(default)]
    pub rag_query: Option<String>,
    #[serde(default)]
    pub style_query: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

/// The macro adaptation blueprint supplied as JSON input.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Blueprint {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub style_keywords: Option<String>,
    #[serde(default)]
    pub episodes: Vec<RawEpisode>,
}

fn first_filled(candidates: &[Option<&String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(|s| s.to_owned())
}

impl Blueprint {
    /// Resolve every raw entry into a concrete spec, applying the fallback
    /// chain: summary -> synopsis -> beats, query -> summary -> title,
    /// style query -> tone -> query. A blueprint without episodes yields one
    /// spec synthesized from the outline.
    pub fn episode_specs(&self) -> Vec<EpisodeSpec> {
        if self.episodes.is_empty() {
            let synopsis = self
                .outline
                .as_deref()
                .map(|o| o.chars().take(200).collect::<String>())
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "自动生成集任务".to_owned());
            return vec![EpisodeSpec {
                episode_number: 1,
                title: self.title.clone().unwrap_or_else(|| "第1集".to_owned()),
                summary: synopsis.clone(),
                rag_query: synopsis.clone(),
                style_query: self
                    .style_keywords
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(synopsis),
            }];
        }

        self.episodes
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                let index = idx as u32 + 1;
                let summary = first_filled(&[
                    raw.summary.as_ref(),
                    raw.synopsis.as_ref(),
                    raw.beats.as_ref(),
                ])
                .unwrap_or_else(|| format!("Episode {index} synopsis pending"));
                let rag_query = first_filled(&[
                    raw.rag_query.as_ref(),
                    Some(&summary),
                    raw.title.as_ref(),
                ])
                .unwrap_or_else(|| summary.clone());
                let style_query =
                    first_filled(&[raw.style_query.as_ref(), raw.tone.as_ref()])
                        .unwrap_or_else(|| rag_query.clone());
                EpisodeSpec {
                    episode_number: raw.episode_number.unwrap_or(index),
                    title: raw
                        .title
                        .clone()
                        .unwrap_or_else(|| format!("第{index}集")),
                    summary,
                    rag_query,
                    style_query,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    #[default]
    Pending,
    Drafting,
    Validating,
    NeedsReview,
    Approved,
    Escalated,
}

impl EpisodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EpisodeStatus::Approved | EpisodeStatus::Escalated)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    WordCount,
    Punctuation,
    Format,
    ActionLine,
    ContentSafety,
    EmptyDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
    /// 1-based line number when the violation is anchored to a line.
    #[serde(default)]
    pub line: Option<usize>,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(kind: ViolationKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: Some(line),
        }
    }
}

/// Immutable verdict produced by one validator pass over one draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    pub fn passing() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }
}

/// Structured, rule-derived rewrite instruction handed back to the writer.
/// Never free-form prose: every note is keyed by the violation kind it fixes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewriteDirective {
    pub episode_number: u32,
    pub notes: Vec<RewriteNote>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewriteNote {
    pub kind: ViolationKind,
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftAttempt {
    pub draft: String,
    pub report: ValidationReport,
}

/// Mutable per-episode record owned by the engine. Created when an episode
/// starts and mutated only by the engine's transition logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeState {
    pub spec: EpisodeSpec,
    pub retry_count: u32,
    pub status: EpisodeStatus,
    #[serde(default)]
    pub current_draft: Option<String>,
    #[serde(default)]
    pub validation_report: Option<ValidationReport>,
    #[serde(default)]
    pub history: Vec<DraftAttempt>,
}

impl EpisodeState {
    pub fn new(spec: EpisodeSpec) -> Self {
        Self {
            spec,
            retry_count: 0,
            status: EpisodeStatus::Pending,
            current_draft: None,
            validation_report: None,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub episode_number: u32,
    pub title: String,
    pub status: EpisodeStatus,
    pub retry_count: u32,
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,
    pub escalated: bool,
}

/// One structured record per run, enumerating every episode's terminal state
/// so partial success is always legible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub episodes: Vec<EpisodeOutcome>,
}

impl RunSummary {
    pub fn escalated_count(&self) -> usize {
        self.episodes.iter().filter(|e| e.escalated).count()
    }

    pub fn approved_count(&self) -> usize {
        self.episodes
            .iter()
            .filter(|e| e.status == EpisodeStatus::Approved)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_specs_resolve_fallback_chain() {
        let blueprint = Blueprint {
            title: Some("霸道总裁".into()),
            outline: None,
            style_keywords: None,
            episodes: vec![RawEpisode {
                episode_number: None,
                title: None,
                summary: None,
                synopsis: Some("女主觉醒".into()),
                beats: Some("ignored".into()),
                rag_query: None,
                style_query: None,
                tone: Some("紧张".into()),
            }],
        };

        let specs = blueprint.episode_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].episode_number, 1);
        assert_eq!(specs[0].title, "第1集");
        assert_eq!(specs[0].summary, "女主觉醒");
        assert_eq!(specs[0].rag_query, "女主觉醒");
        assert_eq!(specs[0].style_query, "紧张");
    }

    #[test]
    fn episode_specs_without_episodes_uses_outline() {
        let blueprint = Blueprint {
            title: Some("重生".into()),
            outline: Some("主角重生复仇".into()),
            style_keywords: Some("爽文 快节奏".into()),
            episodes: vec![],
        };

        let specs = blueprint.episode_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].title, "重生");
        assert_eq!(specs[0].rag_query, "主角重生复仇");
        assert_eq!(specs[0].style_query, "爽文 快节奏");
    }

    #[test]
    fn episode_specs_empty_fields_get_placeholders() {
        let blueprint = Blueprint {
            episodes: vec![RawEpisode::default(), RawEpisode::default()],
            ..Blueprint::default()
        };

        let specs = blueprint.episode_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].episode_number, 2);
        assert_eq!(specs[1].title, "第2集");
        assert!(specs[1].summary.contains("Episode 2"));
    }

    #[test]
    fn validation_report_passed_iff_no_violations() {
        let ok = ValidationReport::from_violations(vec![]);
        assert!(ok.passed);

        let bad = ValidationReport::from_violations(vec![Violation::new(
            ViolationKind::WordCount,
            "too short",
        )]);
        assert!(!bad.passed);
        assert_eq!(bad.violations.len(), 1);
    }

    #[test]
    fn episode_status_terminal_states() {
        assert!(EpisodeStatus::Approved.is_terminal());
        assert!(EpisodeStatus::Escalated.is_terminal());
        assert!(!EpisodeStatus::Pending.is_terminal());
        assert!(!EpisodeStatus::NeedsReview.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&EpisodeStatus::NeedsReview).unwrap();
        assert_eq!(json, "\"needs_review\"");
    }

    #[test]
    fn blueprint_parses_minimal_json() {
        let raw = r#"{"episodes": [{"title": "第1集", "summary": "开局"}]}"#;
        let blueprint: Blueprint = serde_json::from_str(raw).unwrap();
        let specs = blueprint.episode_specs();
        assert_eq!(specs[0].rag_query, "开局");
    }
}
