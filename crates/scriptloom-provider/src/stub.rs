use anyhow::Result;
use async_trait::async_trait;

use crate::{DraftProvider, DraftRequest, DraftResponse};

const FILLER_LINE: &str = "旁白：镜头扫过现场，细节交代剧情推进的线索。";

/// Offline writer: assembles a format-valid draft from the retrieved
/// material, deterministically, and pads narration until the draft reaches
/// the configured character band. No network, no randomness.
pub struct StubDraftProvider {
    min_chars: usize,
    max_chars: usize,
}

impl StubDraftProvider {
    pub fn new(min_chars: usize, max_chars: usize) -> Self {
        Self {
            min_chars,
            max_chars: max_chars.max(min_chars),
        }
    }
}

impl Default for StubDraftProvider {
    fn default() -> Self {
        Self::new(1000, 1300)
    }
}

/// Strip punctuation the screenplay format forbids; source prose is full of
/// ellipses and dashes.
fn sanitize(text: &str) -> String {
    text.replace("...", "，")
        .replace("——", "，")
        .replace("--", "，")
        .replace('…', "，")
        .replace('—', "，")
}

fn first_line_excerpt(passage: &str, max_chars: usize) -> String {
    let line = passage
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("根据原著扩写冲突");
    sanitize(&line.chars().take(max_chars).collect::<String>())
}

#[async_trait]
impl DraftProvider for StubDraftProvider {
    async fn draft(&self, request: DraftRequest) -> Result<DraftResponse> {
        let episode = request.spec.episode_number;
        let summary = sanitize(request.spec.summary.trim());
        let mut lines: Vec<String> = Vec::new();

        let passages: Vec<&String> = request.content_passages.iter().take(3).collect();
        if passages.is_empty() {
            lines.push(format!("[{episode}-1] 改编场景 - 内 - 夜"));
            lines.push(format!("旁白：{summary}"));
            lines.push("角色1：根据原著补全对话。".to_string());
            lines.push("△ 角色1：摆放关键道具示意冲突".to_string());
        }
        for (scene_index, passage) in passages.iter().enumerate() {
            let scene_number = scene_index + 1;
            lines.push(format!("[{episode}-{scene_number}] 改编场景 - 内 - 夜"));
            lines.push(format!("旁白：{summary}"));
            lines.push(format!(
                "旁白：改编依据，{}",
                first_line_excerpt(passage, 80)
            ));
            if let Some(style) = request.style_passages.get(scene_index) {
                for (idx, dialogue) in style
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .take(2)
                    .enumerate()
                {
                    lines.push(format!("角色{}：{}", idx + 1, sanitize(dialogue)));
                }
            }
            lines.push(format!("△ 角色{scene_number}：整理道具回应原著情节"));
            lines.push(String::new());
        }

        if let Some(directive) = &request.directive {
            let notes: Vec<String> = directive
                .notes
                .iter()
                .map(|n| sanitize(&n.instruction))
                .collect();
            lines.push(format!("旁白：返工要点，{}", notes.join("；")));
        }

        let mut text = lines.join("\n");
        let filler_cost = FILLER_LINE.chars().count() + 1;
        while text.chars().count() < self.min_chars
            && text.chars().count() + filler_cost <= self.max_chars
        {
            text.push('\n');
            text.push_str(FILLER_LINE);
        }

        Ok(DraftResponse { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptloom_schema::EpisodeSpec;

    fn request() -> DraftRequest {
        DraftRequest {
            spec: EpisodeSpec {
                episode_number: 3,
                title: "摊牌".into(),
                summary: "双方在仓库对峙……".into(),
                rag_query: "仓库对峙".into(),
                style_query: "冷硬".into(),
            },
            content_passages: vec!["他把刀放在桌上——谁也没说话。".into()],
            style_passages: vec!["你走吧。\n我不走。".into()],
            directive: None,
        }
    }

    #[tokio::test]
    async fn stub_draft_is_deterministic() {
        let provider = StubDraftProvider::new(0, 10_000);
        let first = provider.draft(request()).await.unwrap();
        let second = provider.draft(request()).await.unwrap();
        assert_eq!(first.text, second.text);
    }

    #[tokio::test]
    async fn stub_draft_strips_forbidden_punctuation() {
        let provider = StubDraftProvider::new(0, 10_000);
        let response = provider.draft(request()).await.unwrap();
        for mark in ["…", "——", "--", "..."] {
            assert!(!response.text.contains(mark), "found {mark}");
        }
    }

    #[tokio::test]
    async fn stub_draft_pads_to_minimum_length() {
        let provider = StubDraftProvider::new(600, 800);
        let response = provider.draft(request()).await.unwrap();
        let count = response.text.chars().count();
        assert!(count >= 600, "only {count} characters");
        assert!(count <= 800, "{count} characters exceeds band");
    }

    #[tokio::test]
    async fn stub_draft_without_passages_still_produces_a_scene() {
        let provider = StubDraftProvider::new(0, 10_000);
        let mut req = request();
        req.content_passages.clear();
        req.style_passages.clear();
        let response = provider.draft(req).await.unwrap();
        assert!(response.text.contains("[3-1]"));
        assert!(!response.text.trim().is_empty());
    }

    #[tokio::test]
    async fn stub_draft_renders_directive_notes() {
        use scriptloom_schema::{RewriteDirective, RewriteNote, ViolationKind};
        let provider = StubDraftProvider::new(0, 10_000);
        let mut req = request();
        req.directive = Some(RewriteDirective {
            episode_number: 3,
            notes: vec![RewriteNote {
                kind: ViolationKind::Punctuation,
                instruction: "替换全部违禁标点".into(),
            }],
        });
        let response = provider.draft(req).await.unwrap();
        assert!(response.text.contains("返工要点"));
        assert!(response.text.contains("替换全部违禁标点"));
    }
}
