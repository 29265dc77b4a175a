//! Recovery of `<tool_call>` blocks embedded in streamed text
//!
//! Some OpenAI-compatible backends emit tool invocations as
//! `<tool_call>{"name": "...", "arguments": {...}}</tool_call>` inside the
//! text channel instead of structured `tool_calls`.

use serde::Deserialize;

use crate::types::{AdapterResult, ToolCall, tool_use_id};

const OPEN: &str = "<tool_call>";
const CLOSE: &str = "</tool_call>";

#[derive(Deserialize)]
struct EmbeddedCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Split `fragment` into visible text and completed tool calls
///
/// Visible text excludes complete blocks, the body of an unclosed block,
/// and a trailing prefix of the opening tag that may still complete.
pub fn extract(fragment: &str, accumulated: &str) -> AdapterResult {
    if !fragment.contains('<') && !accumulated.contains('<') {
        return AdapterResult::unchanged(fragment);
    }

    let full = format!("{accumulated}{fragment}");
    let before = visible(accumulated);
    let after = visible(&full);
    let cleaned_text = after.get(before.len()..).unwrap_or_default().to_owned();

    let tool_calls: Vec<ToolCall> = completed_blocks(&full)
        .filter(|(end, _)| *end > accumulated.len())
        .filter_map(|(_, body)| parse_call(body))
        .collect();

    let was_transformed = cleaned_text != fragment || !tool_calls.is_empty();

    AdapterResult {
        cleaned_text,
        tool_calls,
        was_transformed,
    }
}

/// Tail of `text` still held back: an unclosed block or a partial opening tag
///
/// Callers keep only this tail as the `accumulated` text for the next
/// fragment, and release it verbatim when the stream ends.
pub fn withheld(text: &str) -> &str {
    let mut offset = 0;

    while let Some(start) = text[offset..].find(OPEN) {
        let open_at = offset + start;
        let inside = open_at + OPEN.len();
        match text[inside..].find(CLOSE) {
            Some(end) => offset = inside + end + CLOSE.len(),
            None => return &text[open_at..],
        }
    }

    let rest = &text[offset..];
    &rest[without_partial_open(rest).len()..]
}

fn visible(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let inside = &rest[start + OPEN.len()..];
        match inside.find(CLOSE) {
            Some(end) => rest = &inside[end + CLOSE.len()..],
            None => return out,
        }
    }

    out.push_str(without_partial_open(rest));
    out
}

fn without_partial_open(text: &str) -> &str {
    (1..OPEN.len())
        .rev()
        .find(|&n| text.ends_with(&OPEN[..n]))
        .map_or(text, |n| &text[..text.len() - n])
}

/// Complete blocks as (end offset, body)
fn completed_blocks(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    std::iter::from_fn(move || {
        let rest = &text[offset..];
        let start = rest.find(OPEN)? + OPEN.len();
        let len = rest[start..].find(CLOSE)?;
        let body = &rest[start..start + len];
        offset += start + len + CLOSE.len();
        Some((offset, body))
    })
}

fn parse_call(body: &str) -> Option<ToolCall> {
    let call: EmbeddedCall = match serde_json::from_str(body.trim()) {
        Ok(call) => call,
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed embedded tool call");
            return None;
        }
    };

    // Arguments sometimes arrive JSON-encoded as a string
    let arguments = match call.arguments {
        serde_json::Value::String(raw) => serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)),
        serde_json::Value::Null => serde_json::json!({}),
        other => other,
    };

    Some(ToolCall {
        id: tool_use_id(),
        name: call.name,
        arguments,
    })
}
