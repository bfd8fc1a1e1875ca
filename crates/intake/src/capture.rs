//! Turning a captured window title into a label.

use crate::sanitize::sanitize;

/// Extracts a label from a window `title`.
///
/// Each of `suffixes` (application names such as `" - KakaoTalk"`) is
/// stripped from the end of the title and removed where it appears inline;
/// the remainder is sanitized. Returns [`None`] when nothing usable is left,
/// in which case the capture should be ignored.
///
/// ```
/// use tagdrop_intake::capture::extract_label;
/// let suffixes = [" - KakaoTalk".to_string()];
/// assert_eq!(extract_label("Team Chat - KakaoTalk", &suffixes, 140).as_deref(), Some("Team Chat"));
/// assert_eq!(extract_label(" - KakaoTalk ", &suffixes, 140), None);
/// ```
pub fn extract_label(title: &str, suffixes: &[String], max_length: usize) -> Option<String> {
    let mut label = title.trim().to_string();
    for suffix in suffixes.iter().filter(|s| !s.trim().is_empty()) {
        let trimmed = suffix.trim();
        while let Some(stripped) = label.strip_suffix(trimmed) {
            label = stripped.trim_end().to_string();
        }
        label = label.replace(suffix.as_str(), " ");
    }
    let label = sanitize(&collapse_whitespace(&label), max_length);
    (!label.is_empty()).then_some(label)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
