//! Upstream frame decoding.
//!
//! The upstream endpoint emits newline-delimited frames: either SSE-framed
//! (`data: <json>`) or bare JSON objects, occasionally a JSON array wrapping
//! several objects in one line, terminated by `data: [DONE]` or connection
//! close. Malformed frames are keep-alive noise and never abort the stream.

use crate::constants::{DONE_SENTINEL, SSE_DATA_PREFIX};
use crate::str_utils;

/// Result of decoding one upstream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    /// Text fragments extracted from the frame, in order. A fragment may be
    /// empty (a no-op tick, e.g. a role-only delta).
    Fragments(Vec<String>),
    /// The explicit end-of-stream sentinel.
    Done,
    /// Blank line or undecodable noise; logged and dropped.
    Skip,
}

pub fn decode_line(line: &str) -> DecodedLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return DecodedLine::Skip;
    }

    let data = trimmed.strip_prefix(SSE_DATA_PREFIX).unwrap_or(trimmed);
    if data == DONE_SENTINEL {
        return DecodedLine::Done;
    }

    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(serde_json::Value::Array(items)) => {
            DecodedLine::Fragments(items.iter().map(extract_content).collect())
        }
        Ok(value) => DecodedLine::Fragments(vec![extract_content(&value)]),
        Err(e) => {
            tracing::debug!(
                "[decode] skipping undecodable line ({}): {}",
                e,
                str_utils::log_snippet(data, 200)
            );
            DecodedLine::Skip
        }
    }
}

/// Pull the delta text out of one decoded chunk object.
///
/// Prefers `choices[0].delta.content`; falls back to
/// `choices[0].message.content` when the delta is absent or empty. A chunk
/// with neither yields an empty fragment.
fn extract_content(value: &serde_json::Value) -> String {
    let choice = match value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        Some(c) => c,
        None => return String::new(),
    };

    if let Some(content) = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
    {
        if !content.is_empty() {
            return content.to_string();
        }
    }

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_delta_fragment() {
        let line = r#"data: {"choices":[{"delta":{"content":"module"}}]}"#;
        assert_eq!(
            decode_line(line),
            DecodedLine::Fragments(vec!["module".to_string()])
        );
    }

    #[test]
    fn test_decode_bare_json_without_prefix() {
        let line = r#"{"choices":[{"delta":{"content":"x"}}]}"#;
        assert_eq!(
            decode_line(line),
            DecodedLine::Fragments(vec!["x".to_string()])
        );
    }

    #[test]
    fn test_decode_done_sentinel() {
        assert_eq!(decode_line("data: [DONE]"), DecodedLine::Done);
    }

    #[test]
    fn test_blank_line_skipped() {
        assert_eq!(decode_line(""), DecodedLine::Skip);
        assert_eq!(decode_line("   "), DecodedLine::Skip);
    }

    #[test]
    fn test_malformed_json_skipped() {
        assert_eq!(decode_line("data: {not json"), DecodedLine::Skip);
    }

    #[test]
    fn test_array_expands_in_order() {
        let line = r#"data: [{"choices":[{"delta":{"content":"a"}}]},{"choices":[{"delta":{"content":"b"}}]}]"#;
        assert_eq!(
            decode_line(line),
            DecodedLine::Fragments(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_message_content_fallback() {
        let line = r#"data: {"choices":[{"message":{"content":"full text"}}]}"#;
        assert_eq!(
            decode_line(line),
            DecodedLine::Fragments(vec!["full text".to_string()])
        );
    }

    #[test]
    fn test_empty_delta_falls_back_to_message() {
        let line = r#"data: {"choices":[{"delta":{"content":""},"message":{"content":"m"}}]}"#;
        assert_eq!(
            decode_line(line),
            DecodedLine::Fragments(vec!["m".to_string()])
        );
    }

    #[test]
    fn test_missing_choices_yields_empty_tick() {
        let line = r#"data: {"usage":{"total_tokens":5}}"#;
        assert_eq!(
            decode_line(line),
            DecodedLine::Fragments(vec![String::new()])
        );
    }

    #[test]
    fn test_role_only_delta_yields_empty_tick() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(
            decode_line(line),
            DecodedLine::Fragments(vec![String::new()])
        );
    }
}
