/// Safely returns a prefix of the string with at most `max_chars` characters.
/// This respects UTF-8 character boundaries.
pub fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncated form of `s` for log lines, with an ellipsis when cut.
pub fn log_snippet(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", prefix_chars(s, max_chars))
    }
}
