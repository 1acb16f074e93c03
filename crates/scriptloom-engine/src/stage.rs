//! The per-episode state machine, as data.
//!
//! Routing lives in [`advance`], a pure function over the current stage, the
//! episode record and the node's outcome. Nothing here touches a capability,
//! so every pass/fail/retry decision is reproducible and unit-testable
//! without a writer or an index.

use scriptloom_schema::{
    DraftAttempt, EpisodeState, EpisodeStatus, ValidationReport, Violation, ViolationKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Retrieve,
    Write,
    Validate,
    Review,
    Deliver,
    Escalated,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Deliver | Stage::Escalated)
    }
}

/// What just happened at the current node.
#[derive(Debug, Clone)]
pub enum StageEvent {
    /// The episode brief is resolved.
    Planned,
    /// Both retrieval spaces were queried (failures degrade to empty sets).
    Retrieved,
    /// The writer returned; the draft (possibly empty) is on the state.
    Drafted,
    /// The validator (or the empty-draft short circuit) produced a report.
    Validated(ValidationReport),
    /// A rewrite directive was derived from the failing report.
    Reviewed,
}

/// Advance the machine one transition. Mismatched `(stage, event)` pairs
/// leave the stage unchanged; terminal stages never move.
pub fn advance(
    stage: Stage,
    state: &mut EpisodeState,
    event: StageEvent,
    max_retries: u32,
) -> Stage {
    match (stage, event) {
        (Stage::Plan, StageEvent::Planned) => Stage::Retrieve,
        (Stage::Retrieve, StageEvent::Retrieved) => {
            state.status = EpisodeStatus::Drafting;
            Stage::Write
        }
        (Stage::Write, StageEvent::Drafted) => {
            state.status = EpisodeStatus::Validating;
            Stage::Validate
        }
        (Stage::Validate, StageEvent::Validated(report)) => {
            state.history.push(DraftAttempt {
                draft: state.current_draft.clone().unwrap_or_default(),
                report: report.clone(),
            });
            state.validation_report = Some(report.clone());
            if report.passed {
                state.status = EpisodeStatus::Approved;
                Stage::Deliver
            } else if state.retry_count < max_retries {
                state.status = EpisodeStatus::NeedsReview;
                Stage::Review
            } else {
                state.status = EpisodeStatus::Escalated;
                Stage::Escalated
            }
        }
        (Stage::Review, StageEvent::Reviewed) => {
            state.retry_count += 1;
            state.status = EpisodeStatus::Drafting;
            Stage::Write
        }
        (stage, event) => {
            tracing::warn!(?stage, ?event, "ignoring event not valid for stage");
            stage
        }
    }
}

/// The failed-validation report for an attempt that never produced usable
/// text (empty draft, or generation retries exhausted). The Validator is not
/// invoked for these.
pub fn empty_draft_report() -> ValidationReport {
    ValidationReport::from_violations(vec![Violation::new(
        ViolationKind::EmptyDraft,
        "writer returned no usable draft for this attempt",
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptloom_schema::EpisodeSpec;

    fn state() -> EpisodeState {
        EpisodeState::new(EpisodeSpec {
            episode_number: 1,
            title: "第1集".into(),
            summary: "概要".into(),
            rag_query: "概要".into(),
            style_query: "概要".into(),
        })
    }

    fn failing_report() -> ValidationReport {
        ValidationReport::from_violations(vec![Violation::new(
            ViolationKind::WordCount,
            "too short",
        )])
    }

    #[test]
    fn happy_path_reaches_deliver_without_retries() {
        let mut s = state();
        let mut stage = Stage::Plan;
        stage = advance(stage, &mut s, StageEvent::Planned, 3);
        assert_eq!(stage, Stage::Retrieve);
        stage = advance(stage, &mut s, StageEvent::Retrieved, 3);
        assert_eq!(stage, Stage::Write);
        assert_eq!(s.status, EpisodeStatus::Drafting);
        s.current_draft = Some("draft".into());
        stage = advance(stage, &mut s, StageEvent::Drafted, 3);
        assert_eq!(stage, Stage::Validate);
        stage = advance(
            stage,
            &mut s,
            StageEvent::Validated(ValidationReport::passing()),
            3,
        );
        assert_eq!(stage, Stage::Deliver);
        assert_eq!(s.status, EpisodeStatus::Approved);
        assert_eq!(s.retry_count, 0);
        assert!(s.validation_report.as_ref().unwrap().passed);
    }

    #[test]
    fn failed_validation_routes_to_review_below_budget() {
        let mut s = state();
        let stage = advance(
            Stage::Validate,
            &mut s,
            StageEvent::Validated(failing_report()),
            3,
        );
        assert_eq!(stage, Stage::Review);
        assert_eq!(s.status, EpisodeStatus::NeedsReview);
    }

    #[test]
    fn review_increments_retry_and_loops_to_write() {
        let mut s = state();
        let stage = advance(Stage::Review, &mut s, StageEvent::Reviewed, 3);
        assert_eq!(stage, Stage::Write);
        assert_eq!(s.retry_count, 1);
        assert_eq!(s.status, EpisodeStatus::Drafting);
    }

    #[test]
    fn exhausted_budget_escalates() {
        let mut s = state();
        s.retry_count = 3;
        let stage = advance(
            Stage::Validate,
            &mut s,
            StageEvent::Validated(failing_report()),
            3,
        );
        assert_eq!(stage, Stage::Escalated);
        assert_eq!(s.status, EpisodeStatus::Escalated);
    }

    #[test]
    fn retry_count_never_exceeds_budget() {
        let mut s = state();
        let mut stage = Stage::Validate;
        let max_retries = 3;
        let mut write_attempts = 1;
        loop {
            stage = advance(
                stage,
                &mut s,
                StageEvent::Validated(failing_report()),
                max_retries,
            );
            if stage == Stage::Escalated {
                break;
            }
            assert_eq!(stage, Stage::Review);
            stage = advance(stage, &mut s, StageEvent::Reviewed, max_retries);
            assert_eq!(stage, Stage::Write);
            write_attempts += 1;
            s.current_draft = Some("draft".into());
            stage = advance(stage, &mut s, StageEvent::Drafted, max_retries);
            assert!(s.retry_count <= max_retries);
        }
        assert_eq!(s.retry_count, max_retries);
        assert_eq!(write_attempts, 1 + max_retries);
        assert_eq!(s.history.len() as u32, 1 + max_retries);
    }

    #[test]
    fn mismatched_event_is_ignored() {
        let mut s = state();
        let stage = advance(Stage::Plan, &mut s, StageEvent::Reviewed, 3);
        assert_eq!(stage, Stage::Plan);
        assert_eq!(s.retry_count, 0);
    }

    #[test]
    fn empty_draft_report_fails_with_kind() {
        let report = empty_draft_report();
        assert!(!report.passed);
        assert_eq!(report.violations[0].kind, ViolationKind::EmptyDraft);
    }
}
