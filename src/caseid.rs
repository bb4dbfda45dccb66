use regex::Regex;
use std::sync::LazyLock;

/// Ordered patterns tried against an archive file name, most specific
/// first. The first capture of the first match wins.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Full identifier with timestamp, e.g. ABC80125054932__20250805105326
        r"([A-Z]+\d+__\d+)",
        // Identifier without the timestamp part
        r"([A-Z]{3,}[A-Z0-9]*\d{10,})",
        // Looser fallbacks
        r"([A-Z]{2,}\d{8,})",
        r"(\d{10,})",
        r"案[件]?[_-]?(\d+)",
        r"第(\d+)号",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("case id pattern is valid"))
    .collect()
});

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]").expect("non-word pattern is valid"));

/// Best-effort extraction of a case identifier from an archive's file name.
/// Free-text input, so this is heuristic: when no pattern matches, the
/// archive's stem is stripped of non-word characters and truncated.
pub fn extract_case_id(archive_name: &str) -> String {
    for pattern in PATTERNS.iter() {
        if let Some(captures) = pattern.captures(archive_name) {
            if let Some(m) = captures.get(1) {
                return m.as_str().to_string();
            }
        }
    }

    let stem = archive_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(archive_name);
    let cleaned = NON_WORD.replace_all(stem, "");
    let limit = if cleaned.chars().count() > 15 { 50 } else { 20 };
    let truncated: String = cleaned.chars().take(limit).collect();
    if truncated.is_empty() {
        "unknown".to_string()
    } else {
        truncated
    }
}
