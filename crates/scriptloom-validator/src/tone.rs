/// Tone classification strategy for action-line auditing.
///
/// Action lines (`△ 角色：…`) must describe visible physical action. Whether
/// a description reads as emotion rather than action is decided by a
/// [`ToneClassifier`]: a model-backed implementation can be plugged in at
/// startup, and [`KeywordToneClassifier`] is the deterministic fallback that
/// always exists. Callers cannot tell which strategy is active.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneVerdict {
    pub label: String,
    pub emotional: bool,
}

impl ToneVerdict {
    pub fn neutral() -> Self {
        Self {
            label: "neutral".to_string(),
            emotional: false,
        }
    }

    pub fn emotional(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            emotional: true,
        }
    }
}

pub trait ToneClassifier: Send + Sync {
    fn classify(&self, text: &str) -> ToneVerdict;
}

/// Emotion vocabulary that marks an action description as non-physical.
const EMOTION_KEYWORDS: &[&str] = &[
    "愤怒",
    "生气",
    "悲伤",
    "绝望",
    "喜极",
    "兴奋",
    "害怕",
    "恐惧",
    "焦虑",
    "无奈",
    "紧张",
    "惊呆",
];

/// Keyword-rule fallback. Deterministic, requires no external capability.
#[derive(Debug, Default, Clone)]
pub struct KeywordToneClassifier;

impl ToneClassifier for KeywordToneClassifier {
    fn classify(&self, text: &str) -> ToneVerdict {
        match EMOTION_KEYWORDS.iter().find(|k| text.contains(*k)) {
            Some(keyword) => ToneVerdict::emotional(format!("emotional:{keyword}")),
            None => ToneVerdict::neutral(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_action_is_neutral() {
        let verdict = KeywordToneClassifier.classify("整理桌上的文件后推门离开");
        assert!(!verdict.emotional);
        assert_eq!(verdict.label, "neutral");
    }

    #[test]
    fn emotion_keyword_is_flagged() {
        let verdict = KeywordToneClassifier.classify("愤怒地摔门而去");
        assert!(verdict.emotional);
        assert!(verdict.label.contains("愤怒"));
    }

    #[test]
    fn classification_is_deterministic() {
        let first = KeywordToneClassifier.classify("紧张地搓手");
        let second = KeywordToneClassifier.classify("紧张地搓手");
        assert_eq!(first, second);
    }
}
