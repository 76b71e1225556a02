//! Caption line wrapping.
//!
//! Captions are split on sentence/clause punctuation (Chinese and Latin) and
//! whitespace, then any fragment longer than the per-line cap is hard-chunked
//! into fixed-size character windows. Chunking is deliberately unaware of
//! word boundaries: captions are short and a mid-word cut is acceptable.

/// Returns true for characters that end a display line and are themselves
/// dropped from the output.
fn is_boundary(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '，' | ',' | '。' | '.' | '！' | '!' | '？' | '?' | '；' | ';' | '：' | ':'
        )
}

/// Splits `text` into display lines of at most `max_chars` characters.
///
/// Boundary characters never appear in the output; empty fragments are
/// discarded, so a caption consisting only of boundary characters yields an
/// empty vector. Source order of the remaining characters is preserved.
pub fn wrap_caption(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for fragment in text.split(is_boundary).filter(|f| !f.is_empty()) {
        let chars: Vec<char> = fragment.chars().collect();
        if chars.len() <= max_chars {
            lines.push(fragment.to_string());
        } else {
            for window in chars.chunks(max_chars) {
                lines.push(window.iter().collect());
            }
        }
    }

    lines
}
