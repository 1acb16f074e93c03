//! Review node: deterministic translation of a failing validation report
//! into a structured rewrite directive. No prose generation happens here —
//! each violation kind maps to a fixed instruction.

use scriptloom_schema::{RewriteDirective, RewriteNote, ValidationReport, ViolationKind};

fn instruction_for(kind: ViolationKind) -> &'static str {
    match kind {
        ViolationKind::WordCount => "补足剧情信息但避免灌水，优先扩写关键冲突场景。",
        ViolationKind::Punctuation => "替换所有省略号或破折号为符合铁律的标点。",
        ViolationKind::Format => "逐行核对场景、旁白、动作格式，确保一行只含一个元素。",
        ViolationKind::ActionLine => "把动作行的情绪描述改写为可见的物理动作。",
        ViolationKind::ContentSafety => "重新处理触犯审查底线的内容，改用隐喻或安全表达。",
        ViolationKind::EmptyDraft => "输出完整剧本文本，禁止空响应或截断。",
    }
}

/// One note per violation kind present in the report, in first-seen order.
pub fn directive_from_report(episode_number: u32, report: &ValidationReport) -> RewriteDirective {
    let mut notes: Vec<RewriteNote> = Vec::new();
    for violation in &report.violations {
        if notes.iter().any(|note| note.kind == violation.kind) {
            continue;
        }
        notes.push(RewriteNote {
            kind: violation.kind,
            instruction: instruction_for(violation.kind).to_string(),
        });
    }
    RewriteDirective {
        episode_number,
        notes,
    }
}
