use std::sync::LazyLock;

use regex::Regex;
use scriptloom_schema::{Violation, ViolationKind};

use crate::tone::ToneClassifier;

/// Punctuation the screenplay format forbids outright.
const FORBIDDEN_PUNCTUATION: &[&str] = &["...", "…", "——", "—", "--"];

/// Built-in content-safety denylist; run config may extend it.
pub const DEFAULT_DENYLIST: &[&str] = &["黄赌毒", "赌博", "毒品", "贩毒", "嫖娼", "吸毒"];

static SCENE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[\d+-\d+\]\s+.+?\s*-\s*(?:内|外)\s*-\s*(?:日|夜)\s*$").expect("valid regex")
});
static ACTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*△\s*.+?：(.*)$").expect("valid regex"));
static NARRATION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*旁白：.+$").expect("valid regex"));
static OS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*OS：.+$").expect("valid regex"));
static DIALOGUE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\p{Han}A-Za-z0-9_]+：.*$").expect("valid regex"));

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Draft length must fall inside the configured character band; the message
/// cites how far off it is.
pub fn check_length(draft: &str, min_chars: usize, max_chars: usize) -> Vec<Violation> {
    let count = draft.chars().count();
    if count < min_chars {
        vec![Violation::new(
            ViolationKind::WordCount,
            format!(
                "draft is {count} characters, {} short of the {min_chars}-{max_chars} band",
                min_chars - count
            ),
        )]
    } else if count > max_chars {
        vec![Violation::new(
            ViolationKind::WordCount,
            format!(
                "draft is {count} characters, {} over the {min_chars}-{max_chars} band",
                count - max_chars
            ),
        )]
    } else {
        Vec::new()
    }
}

pub fn check_punctuation(draft: &str) -> Vec<Violation> {
    let mut offending: Vec<&str> = FORBIDDEN_PUNCTUATION
        .iter()
        .copied()
        .filter(|mark| draft.contains(mark))
        .collect();
    offending.sort_unstable();
    offending.dedup();
    if offending.is_empty() {
        Vec::new()
    } else {
        vec![Violation::new(
            ViolationKind::Punctuation,
            format!("forbidden punctuation found: {}", offending.join(", ")),
        )]
    }
}

/// Every line must match exactly one screenplay element: scene heading,
/// narration, OS, action, dialogue, or blank.
pub fn check_format(draft: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (idx, line) in draft.lines().enumerate() {
        let allowed = is_blank(line)
            || SCENE_HEADING.is_match(line)
            || ACTION_LINE.is_match(line)
            || NARRATION_LINE.is_match(line)
            || OS_LINE.is_match(line)
            || DIALOGUE_LINE.is_match(line);
        if !allowed {
            violations.push(Violation::at_line(
                ViolationKind::Format,
                idx + 1,
                format!("line does not match any screenplay element: {}", line.trim()),
            ));
        }
    }
    violations
}

/// Action (`△`) lines must stay physical; emotion labels belong in dialogue.
pub fn check_action_lines(draft: &str, classifier: &dyn ToneClassifier) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (idx, line) in draft.lines().enumerate() {
        let Some(captures) = ACTION_LINE.captures(line) else {
            continue;
        };
        let description = captures[1].trim().to_owned();
        if description.is_empty() {
            continue;
        }
        let verdict = classifier.classify(&description);
        if verdict.emotional {
            violations.push(Violation::at_line(
                ViolationKind::ActionLine,
                idx + 1,
                format!("action line reads as {}: {description}", verdict.label),
            ));
        }
    }
    violations
}

pub fn check_content_safety(draft: &str, denylist: &[String]) -> Vec<Violation> {
    let lowered = draft.to_lowercase();
    let mut hits: Vec<&str> = denylist
        .iter()
        .map(String::as_str)
        .filter(|term| !term.is_empty() && lowered.contains(&term.to_lowercase()))
        .collect();
    hits.dedup();
    if hits.is_empty() {
        Vec::new()
    } else {
        vec![Violation::new(
            ViolationKind::ContentSafety,
            format!("forbidden topics present: {}", hits.join(", ")),
        )]
    }
}
