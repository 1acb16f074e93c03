//! Prompt assembly for LLM-backed writers. The exact wording is not load
//! bearing; the structure is: format rules in the system prompt, brief plus
//! retrieved material plus rewrite directive in the user prompt.

use crate::DraftRequest;

pub const SYSTEM_PROMPT: &str = "\
你是短剧主笔编剧。输出剧本必须逐行符合以下元素之一：
场景标记 [集-场] 名称 - 内/外 - 日/夜；旁白：内容；OS：内容；\
△ 角色：可见的物理动作；角色名：台词。
禁止使用省略号、破折号。动作行只写可见动作，不写情绪词。";

pub fn render_user_prompt(request: &DraftRequest) -> String {
    let mut sections = Vec::new();
    sections.push(format!(
        "第{}集《{}》\n剧情概要：{}",
        request.spec.episode_number, request.spec.title, request.spec.summary
    ));

    if !request.content_passages.is_empty() {
        sections.push(format!(
            "原著素材（改编依据）：\n{}",
            request.content_passages.join("\n\n")
        ));
    }
    if !request.style_passages.is_empty() {
        sections.push(format!(
            "风格范例（模仿语感）：\n{}",
            request.style_passages.join("\n\n")
        ));
    }
    if let Some(directive) = &request.directive {
        let notes: Vec<String> = directive
            .notes
            .iter()
            .map(|note| format!("- {}", note.instruction))
            .collect();
        sections.push(format!("返工指令（必须全部执行）：\n{}", notes.join("\n")));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptloom_schema::{EpisodeSpec, RewriteDirective, RewriteNote, ViolationKind};

    fn request() -> DraftRequest {
        DraftRequest {
            spec: EpisodeSpec {
                episode_number: 7,
                title: "反转".into(),
                summary: "身份曝光".into(),
                rag_query: "身份曝光".into(),
                style_query: "快节奏".into(),
            },
            content_passages: vec!["他撕下了面具。".into()],
            style_passages: vec!["短句。强冲突。".into()],
            directive: None,
        }
    }

    #[test]
    fn prompt_contains_brief_and_passages() {
        let prompt = render_user_prompt(&request());
        assert!(prompt.contains("第7集"));
        assert!(prompt.contains("他撕下了面具。"));
        assert!(prompt.contains("短句。强冲突。"));
        assert!(!prompt.contains("返工指令"));
    }

    #[test]
    fn directive_notes_are_rendered_as_list() {
        let mut req = request();
        req.directive = Some(RewriteDirective {
            episode_number: 7,
            notes: vec![RewriteNote {
                kind: ViolationKind::WordCount,
                instruction: "补足剧情信息".into(),
            }],
        });
        let prompt = render_user_prompt(&req);
        assert!(prompt.contains("返工指令"));
        assert!(prompt.contains("- 补足剧情信息"));
    }
}
