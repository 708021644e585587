//! Best-effort extraction of structured fields from raw inference output.
//!
//! Heuristics are attempted in order, first success wins:
//!
//! 1. The trimmed string is itself a JSON object.
//! 2. A fenced ```json block, or any balanced `{...}` substring, parses as
//!    a JSON object.
//! 3. Line-oriented `key<sep>value` extraction, with known synonymous keys
//!    normalized to their canonical identifiers.
//! 4. Fallback: the whole text becomes a truncated summary plus a full
//!    detailed-description field.
//!
//! This function never fails; bad input degrades to the fallback.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Characters kept for the fallback summary field.
const FALLBACK_SUMMARY_CHARS: usize = 500;

/// Separators tried per line, in order. ASCII colon before the full-width
/// one so `key: value` is split before `key：value` gets a chance.
const SEPARATORS: [char; 5] = [':', '：', '=', '-', '|'];

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("static regex"));

/// Synonym table: known key spellings to canonical identifiers.
///
/// First-listed spellings are what the prompt asks for; the rest are legacy
/// and English variants observed in the wild.
const KEY_SYNONYMS: &[(&str, &str)] = &[
    ("视频序列号", "video_serial_number"),
    ("序列号", "video_serial_number"),
    ("编号", "video_serial_number"),
    ("sequence_id", "video_serial_number"),
    ("serial_number", "video_serial_number"),
    ("video_serial_number", "video_serial_number"),
    ("视频内容摘要", "video_content_summary"),
    ("内容摘要", "video_content_summary"),
    ("摘要", "video_content_summary"),
    ("summary", "video_content_summary"),
    ("video_content_summary", "video_content_summary"),
    ("详细内容描述", "detailed_content_description"),
    ("详细描述", "detailed_content_description"),
    ("描述", "detailed_content_description"),
    ("description", "detailed_content_description"),
    ("detailed_description", "detailed_content_description"),
    ("detailed_content_description", "detailed_content_description"),
    ("关键词标签", "keywords_tags"),
    ("关键词", "keywords_tags"),
    ("标签", "keywords_tags"),
    ("核心标签", "keywords_tags"),
    ("keywords", "keywords_tags"),
    ("tags", "keywords_tags"),
    ("keywords_tags", "keywords_tags"),
    ("主要对象", "main_characters_objects"),
    ("主要人物对象", "main_characters_objects"),
    ("主要人物", "main_characters_objects"),
    ("main_objects", "main_characters_objects"),
    ("main_characters", "main_characters_objects"),
    ("main_characters_objects", "main_characters_objects"),
    ("视频源路径", "video_source_path"),
    ("源路径", "video_source_path"),
    ("视频链接", "video_source_path"),
    ("video_source_path", "video_source_path"),
];

/// Parse raw inference output into a field/value map.
///
/// Empty or whitespace-only input yields an empty map. Values from JSON are
/// coerced to strings: scalars by display, composites as compact JSON.
pub fn parse(raw: &str) -> BTreeMap<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return BTreeMap::new();
    }

    // 1. The whole string is a JSON object.
    if trimmed.starts_with('{') {
        if let Some(map) = parse_json_object(trimmed) {
            return map;
        }
    }

    // 2. Embedded JSON: fenced block first, then balanced brace candidates.
    if let Some(map) = extract_embedded_json(trimmed) {
        return map;
    }

    // 3. Line-oriented key/value pairs.
    let pairs = extract_line_pairs(trimmed);
    if !pairs.is_empty() {
        return pairs;
    }

    // 4. Nothing structured: the whole text becomes summary + description.
    let mut fallback = BTreeMap::new();
    fallback.insert(
        "summary".to_string(),
        truncate_chars(trimmed, FALLBACK_SUMMARY_CHARS),
    );
    fallback.insert("detailed_description".to_string(), trimmed.to_string());
    fallback
}

fn parse_json_object(text: &str) -> Option<BTreeMap<String, String>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => {
            let mut map = BTreeMap::new();
            // Iteration follows document order (serde_json preserve_order),
            // so the first spelling of a canonical key in the text wins.
            for (key, value) in obj {
                let canonical = canonical_key(&key);
                map.entry(canonical).or_insert_with(|| value_to_string(&value));
            }
            Some(map)
        }
        Ok(_) => None,
        Err(e) => {
            debug!("direct JSON parse failed: {}", e);
            None
        }
    }
}

fn extract_embedded_json(text: &str) -> Option<BTreeMap<String, String>> {
    if let Some(captures) = FENCED_JSON.captures(text) {
        if let Some(map) = parse_json_object(captures[1].trim()) {
            return Some(map);
        }
    }

    for candidate in brace_candidates(text) {
        if let Some(map) = parse_json_object(candidate) {
            return Some(map);
        }
    }

    None
}

/// Find balanced-looking `{...}` substrings, outermost first.
fn brace_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            let mut depth = 0usize;
            for (j, &b) in bytes.iter().enumerate().skip(i) {
                match b {
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            candidates.push(&text[i..=j]);
                            i = j;
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        i += 1;
    }
    candidates
}

fn extract_line_pairs(text: &str) -> BTreeMap<String, String> {
    let mut pairs = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = split_line(line) else {
            continue;
        };

        let key = key
            .trim()
            .trim_start_matches(['【', '-', '*', '#'])
            .trim_end_matches('】')
            .trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }

        // First occurrence of a canonical key wins; later duplicates are
        // dropped silently.
        pairs
            .entry(canonical_key(key))
            .or_insert_with(|| value.to_string());
    }

    pairs
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    for sep in SEPARATORS {
        if let Some(idx) = line.find(sep) {
            let (key, rest) = line.split_at(idx);
            return Some((key, &rest[sep.len_utf8()..]));
        }
    }
    None
}

pub(crate) fn canonical_key(key: &str) -> String {
    let lowered = key.to_lowercase();
    for (synonym, canonical) in KEY_SYNONYMS {
        if *synonym == key || *synonym == lowered {
            return (*canonical).to_string();
        }
    }
    key.to_string()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("   \n  ").is_empty());
    }

    #[test]
    fn test_direct_json_object() {
        let raw = r#"{"视频内容摘要": "一段测试视频", "keywords_tags": "测试,演示", "count": 3}"#;
        let map = parse(raw);
        assert_eq!(map["video_content_summary"], "一段测试视频");
        assert_eq!(map["keywords_tags"], "测试,演示");
        assert_eq!(map["count"], "3");
    }

    #[test]
    fn test_fenced_json_ignores_prose() {
        let raw = "分析结果如下：\n```json\n{\"summary\": \"夜景航拍\"}\n```\n以上供参考。";
        let map = parse(raw);
        assert_eq!(map["video_content_summary"], "夜景航拍");
        assert!(!map.contains_key("以上供参考。"));
    }

    #[test]
    fn test_embedded_brace_block() {
        let raw = "前导文本 {\"tags\": \"猫\"} 尾随文本";
        let map = parse(raw);
        assert_eq!(map["keywords_tags"], "猫");
    }

    #[test]
    fn test_line_pairs_with_synonyms() {
        let raw = "视频序列号: ABC123\n关键词标签: 猫,狗";
        let map = parse(raw);
        assert_eq!(map["video_serial_number"], "ABC123");
        assert_eq!(map["keywords_tags"], "猫,狗");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_line_pairs_separator_variants() {
        let map = parse("摘要：全角冒号\nmain_objects=行人\n补充说明|原样保留");
        assert_eq!(map["video_content_summary"], "全角冒号");
        assert_eq!(map["main_characters_objects"], "行人");
        assert_eq!(map["补充说明"], "原样保留");
    }

    #[test]
    fn test_duplicate_canonical_key_first_wins() {
        let map = parse("序列号: FIRST\n视频序列号: SECOND");
        assert_eq!(map["video_serial_number"], "FIRST");
    }

    #[test]
    fn test_json_duplicate_canonical_key_follows_text_order() {
        // "关键词" sorts after "keywords" but comes first in the document;
        // the textual first occurrence must win, not the alphabetical one.
        let raw = r#"{"关键词": "文中在前", "keywords": "文中在后"}"#;
        let map = parse(raw);
        assert_eq!(map["keywords_tags"], "文中在前");
    }

    #[test]
    fn test_fallback_for_unstructured_text() {
        let raw = "这是一段没有任何结构的描述文本。";
        let map = parse(raw);
        assert_eq!(map["detailed_description"], raw);
        assert_eq!(map["summary"], raw);
    }

    #[test]
    fn test_fallback_truncates_summary() {
        let raw = "字".repeat(600);
        let map = parse(&raw);
        assert_eq!(map["summary"].chars().count(), 500);
        assert_eq!(map["detailed_description"].chars().count(), 600);
    }

    #[test]
    fn test_invalid_json_degrades_to_lines() {
        let raw = "{not json at all\n标签: 海边";
        let map = parse(raw);
        assert_eq!(map["keywords_tags"], "海边");
    }
}
