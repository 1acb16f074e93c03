//! Narrative-aware scene splitting.
//!
//! Splits long-form prose into scene-sized units along narrative boundaries
//! (time markers, location changes, speaker changes) instead of fixed-size
//! windows, so retrieval works on screenplay-friendly units.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scriptloom_schema::SceneUnit;

/// Temporal transition markers that usually open a new scene.
const TIME_MARKERS: &[&str] = &[
    "天后",
    "夜里",
    "清晨",
    "傍晚",
    "随后",
    "与此同时",
    "此刻",
    "第二天",
    "三天后",
];

/// Verbs of arrival that signal a location change.
const LOCATION_MARKERS: &[&str] = &["到了", "回到", "来到", "走进"];

static LOCATION_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"在\s*(.{1,12}?)(?:里|内|外|旁)").expect("valid regex"));

static SPEAKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*([\p{Han}A-Za-z0-9_]{1,8})：").expect("valid regex")
});

const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？', '!', '?', '.'];

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Minimum characters before a boundary cue may close a unit.
    pub min_chars: usize,
    /// Hard unit size cap; hitting it forces a boundary.
    pub max_chars: usize,
    /// How far back (in characters) to search for a sentence terminator when
    /// forcing a boundary at `max_chars`.
    pub lookback_chars: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            min_chars: 300,
            max_chars: 3200,
            lookback_chars: 200,
        }
    }
}

#[derive(Debug, Clone)]
struct Paragraph {
    /// Byte offset of the paragraph's first line.
    start: usize,
    speakers: BTreeSet<String>,
    location: Option<String>,
    has_cue: bool,
}

/// Split `text` into ordered scene units. Deterministic for identical input
/// and config. Unit offset ranges partition the input: `units[0].start == 0`,
/// `units[i].end == units[i + 1].start`, and the final unit ends at
/// `text.len()`. Empty or whitespace-only input yields no units.
pub fn split(text: &str, config: &SplitterConfig, source_tag: &str) -> Vec<SceneUnit> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let paragraphs = scan_paragraphs(text);
    let boundaries = collect_boundaries(text, &paragraphs);
    assemble_units(text, config, &paragraphs, boundaries, source_tag)
}

/// Paragraph ranges (blank-line separated) with per-paragraph narrative
/// metadata. Offsets index the unmodified source.
fn scan_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut current_end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim().is_empty() {
            if let Some(start) = current_start.take() {
                paragraphs.push(make_paragraph(text, start, current_end));
            }
        } else {
            if current_start.is_none() {
                current_start = Some(line_start);
            }
            current_end = offset;
        }
    }
    if let Some(start) = current_start {
        paragraphs.push(make_paragraph(text, start, current_end));
    }

    paragraphs
}

fn make_paragraph(text: &str, start: usize, end: usize) -> Paragraph {
    let body = &text[start..end];
    let speakers: BTreeSet<String> = SPEAKER_LINE
        .captures_iter(body)
        .map(|c| c[1].to_owned())
        .collect();
    let location = LOCATION_PHRASE
        .captures(body)
        .map(|c| c[1].trim().to_owned())
        .filter(|l| !l.is_empty());

    let time_hit = TIME_MARKERS.iter().any(|m| body.contains(m));
    let location_hit =
        LOCATION_MARKERS.iter().any(|m| body.contains(m)) || LOCATION_PHRASE.is_match(body);
    let dialogue_density =
        body.matches('“').count() + body.matches('"').count();

    Paragraph {
        start,
        speakers,
        location,
        has_cue: time_hit || location_hit || dialogue_density >= 4,
    }
}

/// Candidate boundary offsets: the start of the paragraph following one that
/// carries a boundary cue, or one whose speaker set is disjoint from the
/// speakers accumulated since the last boundary.
fn collect_boundaries(text: &str, paragraphs: &[Paragraph]) -> Vec<usize> {
    let mut boundaries = Vec::new();
    let mut accumulated_speakers: BTreeSet<String> = BTreeSet::new();

    for (idx, paragraph) in paragraphs.iter().enumerate() {
        let speaker_shift = !paragraph.speakers.is_empty()
            && !accumulated_speakers.is_empty()
            && paragraph.speakers.is_disjoint(&accumulated_speakers);
        accumulated_speakers.extend(paragraph.speakers.iter().cloned());

        if paragraph.has_cue || speaker_shift {
            let boundary = paragraphs
                .get(idx + 1)
                .map(|next| next.start)
                .unwrap_or(text.len());
            if boundary < text.len() {
                boundaries.push(boundary);
            }
            accumulated_speakers.clear();
        }
    }

    boundaries
}

/// Walk the text character by character, closing units at cue boundaries once
/// `min_chars` is reached and forcing a close at `max_chars` — preferring the
/// nearest preceding sentence terminator within the lookback window over a
/// hard cut.
fn assemble_units(
    text: &str,
    config: &SplitterConfig,
    paragraphs: &[Paragraph],
    boundaries: Vec<usize>,
    source_tag: &str,
) -> Vec<SceneUnit> {
    let min_chars = config.min_chars.max(1);
    let max_chars = config.max_chars.max(min_chars);

    let mut cuts: Vec<usize> = Vec::new();
    let mut soft = boundaries.into_iter().peekable();

    let mut unit_start = 0usize;
    let mut count = 0usize;
    // Last sentence terminator seen in the current unit: (offset after the
    // terminator char, unit char count at that point).
    let mut last_terminator: Option<(usize, usize)> = None;

    for (offset, ch) in text.char_indices() {
        while soft.peek().is_some_and(|b| *b <= offset) {
            let boundary = soft.next().expect("peeked");
            if boundary == offset && count >= min_chars {
                cuts.push(boundary);
                unit_start = boundary;
                count = 0;
                last_terminator = None;
            }
        }

        count += 1;
        let after = offset + ch.len_utf8();
        if SENTENCE_TERMINATORS.contains(&ch) {
            last_terminator = Some((after, count));
        }

        if count >= max_chars {
            let cut = match last_terminator {
                Some((term_end, term_count))
                    if term_end > unit_start && count - term_count <= config.lookback_chars =>
                {
                    term_end
                }
                _ => after,
            };
            cuts.push(cut);
            unit_start = cut;
            count = count_chars(&text[cut..after]);
            last_terminator = None;
        }
    }

    // Merge a trailing fragment shorter than min_chars into the prior unit.
    let tail_start = cuts.last().copied().unwrap_or(0);
    if count_chars(text[tail_start..].trim_end()) > 0 {
        if count_chars(&text[tail_start..]) < min_chars && !cuts.is_empty() {
            cuts.pop();
        }
    } else if !cuts.is_empty() {
        // The final cut already consumed everything meaningful.
        cuts.pop();
    }

    let mut units = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0usize;
    for end in cuts.into_iter().chain(std::iter::once(text.len())) {
        if end <= start {
            continue;
        }
        let body = &text[start..end];
        let index = units.len() + 1;
        let mut characters = BTreeSet::new();
        let mut location = None;
        for paragraph in paragraphs {
            if paragraph.start >= start && paragraph.start < end {
                characters.extend(paragraph.speakers.iter().cloned());
                if location.is_none() {
                    location = paragraph.location.clone();
                }
            }
        }
        units.push(SceneUnit {
            id: format!("{source_tag}-scene-{index:04}"),
            start,
            end,
            text: body.to_owned(),
            location,
            characters,
            char_count: count_chars(body),
        });
        start = end;
    }

    units
}

fn count_chars(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: usize, max: usize) -> SplitterConfig {
        SplitterConfig {
            min_chars: min,
            max_chars: max,
            lookback_chars: 200,
        }
    }

    #[test]
    fn empty_input_yields_no_units() {
        assert!(split("", &SplitterConfig::default(), "novel").is_empty());
        assert!(split("  \n\n  ", &SplitterConfig::default(), "novel").is_empty());
    }

    #[test]
    fn short_text_yields_single_unit() {
        let units = split("他走了。", &SplitterConfig::default(), "novel");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].start, 0);
        assert_eq!(units[0].end, "他走了。".len());
        assert_eq!(units[0].char_count, 4);
    }

    #[test]
    fn cue_free_text_splits_at_max_chars() {
        let text: String = std::iter::repeat('字').take(10_000).collect();
        let units = split(&text, &config(300, 3200), "novel");
        assert_eq!(units.len(), 4);
        assert_eq!(units[0].char_count, 3200);
        assert_eq!(units[1].char_count, 3200);
        assert_eq!(units[2].char_count, 3200);
        assert_eq!(units[3].char_count, 400);
    }

    #[test]
    fn offsets_partition_the_source() {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!("第{i}段的内容讲述了一些事情。他说了很多话。\n\n"));
        }
        let units = split(&text, &config(50, 200), "novel");
        assert!(!units.is_empty());
        assert_eq!(units[0].start, 0);
        for pair in units.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(units.last().unwrap().end, text.len());
    }

    #[test]
    fn unit_sizes_respect_bounds_except_last() {
        let mut text = String::new();
        for _ in 0..30 {
            text.push_str("夜色渐深，他缓缓开口说出了心里话。她没有回答。\n\n");
        }
        let cfg = config(60, 240);
        let units = split(&text, &cfg, "novel");
        for unit in &units[..units.len() - 1] {
            assert!(unit.char_count >= cfg.min_chars, "unit too small: {}", unit.char_count);
            assert!(unit.char_count <= cfg.max_chars, "unit too big: {}", unit.char_count);
        }
    }

    #[test]
    fn time_marker_opens_boundary_after_min() {
        let mut text = String::new();
        text.push_str(&"他在房间里踱步思考着下一步的计划。".repeat(5));
        text.push_str("\n\n第二天清晨，阳光照进了院子。\n\n");
        text.push_str(&"众人陆续赶到，商量对策直到深夜才散去。".repeat(5));
        let units = split(&text, &config(30, 3200), "novel");
        assert!(units.len() >= 2, "expected a cue boundary, got {}", units.len());
    }

    #[test]
    fn forced_cut_prefers_sentence_terminator() {
        let mut text = String::new();
        text.push_str(&"平淡的叙述没有任何标点符号也没有场景提示词".repeat(10));
        text.push('。');
        text.push_str(&"后续的内容继续延伸没有任何边界提示".repeat(20));
        let units = split(&text, &config(50, 250), "novel");
        // The first forced boundary must land right after the lone terminator.
        let terminator_end = text.find('。').unwrap() + "。".len();
        assert_eq!(units[0].end, terminator_end);
    }

    #[test]
    fn trailing_fragment_merges_into_previous_unit() {
        let mut text: String = std::iter::repeat('字').take(3300).collect();
        text.push_str(&"尾".repeat(50));
        let units = split(&text, &config(300, 3200), "novel");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].char_count, 3350);
    }

    #[test]
    fn detects_speakers_and_location() {
        let text = "\
李雷走进了咖啡馆，在大厅里坐下。

李雷：你终于来了。
韩梅：路上堵车。
";
        // min_chars above the full text length keeps the cue from splitting,
        // so the single unit carries all the metadata.
        let units = split(text, &config(100, 3200), "novel");
        assert_eq!(units.len(), 1);
        assert!(units[0].characters.contains("李雷"));
        assert!(units[0].characters.contains("韩梅"));
        assert!(units[0].location.is_some());
    }

    #[test]
    fn speaker_shift_triggers_boundary() {
        let mut text = String::new();
        text.push_str("甲：今天的事情就到这里吧。\n");
        text.push_str(&"乙：好，我们明天再继续谈下去。\n".repeat(10));
        text.push_str("\n");
        text.push_str(&"丙：你们是谁？丁：别管我们是谁。\n".repeat(10));
        let units = split(&text, &config(20, 3200), "novel");
        assert!(units.len() >= 2);
    }

    #[test]
    fn split_is_deterministic() {
        let text = "清晨，他来到了码头。\n\n随后他登上了那艘船。\n\n".repeat(30);
        let first = split(&text, &config(40, 300), "novel");
        let second = split(&text, &config(40, 300), "novel");
        assert_eq!(first, second);
    }
}
