//! Path segment sanitizing for user-influenced text.

use tagdrop_config::RESERVED_CHARACTERS;

/// Default maximum length, in characters, of a sanitized segment.
pub const DEFAULT_MAX_LENGTH: usize = 140;

/// Makes `text` safe to use as a single file or directory name.
///
/// Every reserved character (`\ / : * ? " < > |`) becomes `_`, surrounding
/// whitespace is trimmed and the result is cut to at most `max_length`
/// characters (not bytes). Whitespace exposed by the cut is trimmed too, which
/// keeps the function idempotent.
///
/// ```
/// use tagdrop_intake::sanitize;
/// assert_eq!(sanitize("  Team: Chat?  ", 140), "Team_ Chat_");
/// assert_eq!(sanitize("a/b\\c", 2), "a_");
/// ```
pub fn sanitize(text: &str, max_length: usize) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if RESERVED_CHARACTERS.contains(&c) { '_' } else { c })
        .collect();
    let truncated: String = replaced.trim().chars().take(max_length).collect();
    truncated.trim_end().to_string()
}
