//! Deterministic screenplay validation.
//!
//! A pure rule engine: no generation capability is ever invoked, identical
//! input and config always produce the identical report, and every check runs
//! so one pass reports all problems at once.

pub mod rules;
pub mod tone;

use std::sync::Arc;

use scriptloom_schema::{PipelineConfig, ValidationReport};

pub use rules::DEFAULT_DENYLIST;
pub use tone::{KeywordToneClassifier, ToneClassifier, ToneVerdict};

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub min_chars: usize,
    pub max_chars: usize,
    pub denylist: Vec<String>,
}

impl ValidatorConfig {
    /// Built-in denylist merged with the run's extra entries.
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        let mut denylist: Vec<String> =
            DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect();
        for term in &config.denylist {
            if !denylist.contains(term) {
                denylist.push(term.clone());
            }
        }
        Self {
            min_chars: config.min_draft_chars,
            max_chars: config.max_draft_chars,
            denylist,
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_chars: 1000,
            max_chars: 1300,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub struct Validator {
    config: ValidatorConfig,
    classifier: Arc<dyn ToneClassifier>,
}

impl Validator {
    /// Validator with the keyword tone fallback, which always exists.
    pub fn new(config: ValidatorConfig) -> Self {
        Self::with_classifier(config, Arc::new(KeywordToneClassifier))
    }

    /// Validator with a caller-selected tone strategy. Both strategies are
    /// treated identically from here on.
    pub fn with_classifier(config: ValidatorConfig, classifier: Arc<dyn ToneClassifier>) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run every check over the draft and collect all violations. The draft
    /// is never mutated.
    pub fn validate(&self, draft: &str) -> ValidationReport {
        let mut violations = Vec::new();
        violations.extend(rules::check_length(
            draft,
            self.config.min_chars,
            self.config.max_chars,
        ));
        violations.extend(rules::check_punctuation(draft));
        violations.extend(rules::check_format(draft));
        violations.extend(rules::check_action_lines(draft, self.classifier.as_ref()));
        violations.extend(rules::check_content_safety(draft, &self.config.denylist));
        ValidationReport::from_violations(violations)
    }
}
