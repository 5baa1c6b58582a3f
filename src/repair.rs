//! Completion text repair.
//!
//! Model output for code completion arrives fence-wrapped, prefixed with
//! prose, or with unclosed blocks. The rules here run in a fixed order over
//! the full accumulated text on every step:
//!
//! 1. strip a leading/trailing code fence
//! 2. strip a leading "Here's the code:"-style lead-in
//! 3. suppress pure-prose answers (no Verilog keyword present)
//! 4. append missing block closers, counted flat per keyword pair
//!
//! Steps 1-2 are idempotent on their own output. Step 4 is not: closers
//! appended at one step may be wrong once more text arrives, so callers must
//! always re-apply to the full accumulated text, never to a prior output.

use crate::constants::{CLOSURE_PAIRS, VERILOG_CONTENT_MARKERS};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LEADING_FENCE: Regex = Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\n?").unwrap();
    static ref TRAILING_FENCE: Regex = Regex::new(r"\n?```\s*$").unwrap();
    static ref COMMENTARY_LEAD: Regex = Regex::new(r"(?i)^(here's|here is|this is).*?:\s*").unwrap();
}

/// Fence stripping, commentary stripping, and the prose gate (rules 1-3).
pub fn clean_completion(text: &str) -> String {
    let text = LEADING_FENCE.replace(text, "");
    let text = TRAILING_FENCE.replace(&text, "");
    let text = COMMENTARY_LEAD.replace(&text, "");

    if !text.trim().is_empty()
        && !VERILOG_CONTENT_MARKERS
            .iter()
            .any(|marker| text.contains(marker))
    {
        return String::new();
    }

    text.into_owned()
}

/// Block-closure repair (rule 4). Openers and closers are counted over
/// `prefix` + `completion` combined; for each pair left unbalanced, the
/// missing closers are appended to the completion on their own lines, unless
/// it already ends with that closer. The counter is flat per pair, so deeply
/// nested blocks can receive closers in the wrong order. That matches the
/// observable behavior this was ported from.
pub fn close_blocks(prefix: &str, completion: &str) -> String {
    let mut combined = String::with_capacity(prefix.len() + completion.len());
    combined.push_str(prefix);
    combined.push_str(completion);

    let mut out = completion.to_string();
    for (opener, closer) in CLOSURE_PAIRS {
        let opens = count_keyword(&combined, opener);
        let closes = count_keyword(&combined, closer);
        if opens > closes && !ends_with_keyword(&out, closer) {
            for _ in closes..opens {
                out.push('\n');
                out.push_str(closer);
            }
        }
    }
    out
}

/// Whether `text` ends with `keyword` as a whole word. `// the weekend` does
/// not end with the keyword `end`.
fn ends_with_keyword(text: &str, keyword: &str) -> bool {
    let trimmed = text.trim_end();
    if !trimmed.ends_with(keyword) {
        return false;
    }
    let start = trimmed.len() - keyword.len();
    start == 0 || !is_word_byte(trimmed.as_bytes()[start - 1])
}

/// The full repair pipeline for the completion use case: cleanup rules over
/// the accumulated text, then closure repair against the prompt prefix.
/// A completion suppressed by the prose gate stays empty; no closers are
/// invented for text the client never sees.
pub fn apply(prefix: &str, accumulated: &str) -> String {
    let cleaned = clean_completion(accumulated);
    if cleaned.is_empty() {
        return cleaned;
    }
    close_blocks(prefix, &cleaned)
}

/// Whole-word occurrence count. `end` must not match inside `endmodule`,
/// nor `module` inside `endmodule`.
fn count_keyword(text: &str, keyword: &str) -> usize {
    let bytes = text.as_bytes();
    text.match_indices(keyword)
        .filter(|(idx, _)| {
            let before_ok = *idx == 0 || !is_word_byte(bytes[idx - 1]);
            let end = idx + keyword.len();
            let after_ok = end >= bytes.len() || !is_word_byte(bytes[end]);
            before_ok && after_ok
        })
        .count()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
