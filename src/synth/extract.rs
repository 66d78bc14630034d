//! Response extraction: turning raw model replies into usable text or JSON.
//!
//! Prompts ask for raw content without markdown fences, but replies still
//! arrive fenced or with a sentence of preamble often enough that every
//! caller goes through here.

use serde_json::Value;

const FENCE: &str = "```";

/// Strips a surrounding markdown code fence from `raw`.
///
/// Handles a leading fence with or without a language tag, a trailing
/// fence, and a single fenced block preceded by prose. Text without fences
/// is returned trimmed.
#[must_use]
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();

    if !trimmed.starts_with(FENCE) {
        if let Some(block) = single_fenced_block(trimmed) {
            return block;
        }
        // An odd fence count means a dangling closer; an even count is
        // content (markdown files with their own code blocks).
        if trimmed.matches(FENCE).count() % 2 == 1 {
            if let Some(body) = trimmed.strip_suffix(FENCE) {
                return body.trim_end().to_string();
            }
        }
        return trimmed.to_string();
    }

    let body = match trimmed.find('\n') {
        Some(newline) => &trimmed[newline + 1..],
        None => trimmed.trim_start_matches('`'),
    };
    let body = body.trim_end();
    let body = body.strip_suffix(FENCE).unwrap_or(body);
    body.trim_end().to_string()
}

/// Content of the fenced block when `text` is a one-line preamble ending in
/// `:` followed by exactly one fenced block and nothing after it.
fn single_fenced_block(text: &str) -> Option<String> {
    if text.matches(FENCE).count() != 2 || !text.ends_with(FENCE) {
        return None;
    }
    let open = text.find(FENCE)?;
    let preamble = text[..open].trim();
    if preamble.contains('\n') || !preamble.ends_with(':') {
        return None;
    }
    let after_open = &text[open + FENCE.len()..];
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = body.rfind(FENCE)?;
    Some(body[..close].trim_end().to_string())
}

/// Extracts the first JSON object from a model reply.
///
/// Tries the fence-stripped reply as a whole, then the span between the
/// first `{` and the last `}`. Returns `None` when neither parses to an object.
#[must_use]
pub fn extract_json_object(raw: &str) -> Option<Value> {
    let stripped = strip_code_fences(raw);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&stripped) {
        return Some(value);
    }

    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&stripped[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Truncates `text` to at most `max_chars` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
