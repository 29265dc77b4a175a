use serde_json::Value;

use crate::types::TokenUsage;

/// Pull token counts out of any known streaming usage shape
///
/// Recognises canonical `message.usage` and `usage`, OpenAI
/// `prompt_tokens`/`completion_tokens`, and Gemini `usageMetadata`
/// (optionally nested under Code Assist's `response`).
pub fn extract_usage(event: &Value) -> Option<TokenUsage> {
    let event = event.get("response").filter(|r| r.is_object()).unwrap_or(event);

    if let Some(meta) = event.get("usageMetadata") {
        let output = count(meta, "candidatesTokenCount") + count(meta, "thoughtsTokenCount");
        return Some(TokenUsage::new(count(meta, "promptTokenCount"), output));
    }

    let usage = event
        .get("usage")
        .or_else(|| event.get("message").and_then(|m| m.get("usage")))
        .filter(|u| u.is_object())?;

    if usage.get("prompt_tokens").is_some() || usage.get("completion_tokens").is_some() {
        return Some(TokenUsage::new(
            count(usage, "prompt_tokens"),
            count(usage, "completion_tokens"),
        ));
    }

    Some(TokenUsage::new(count(usage, "input_tokens"), count(usage, "output_tokens")))
}

fn count(object: &Value, key: &str) -> u64 {
    object.get(key).and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_canonical_message_start() {
        let event = json!({"type": "message_start", "message": {"usage": {"input_tokens": 25, "output_tokens": 1}}});
        assert_eq!(extract_usage(&event), Some(TokenUsage::new(25, 1)));
    }

    #[test]
    fn reads_canonical_message_delta() {
        let event = json!({"type": "message_delta", "usage": {"output_tokens": 15}});
        assert_eq!(extract_usage(&event), Some(TokenUsage::new(0, 15)));
    }

    #[test]
    fn reads_openai_usage_chunk() {
        let event = json!({"choices": [], "usage": {"prompt_tokens": 12, "completion_tokens": 30}});
        assert_eq!(extract_usage(&event), Some(TokenUsage::new(12, 30)));
    }

    #[test]
    fn reads_gemini_and_code_assist_metadata() {
        let gemini = json!({"usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 4, "thoughtsTokenCount": 2}});
        assert_eq!(extract_usage(&gemini), Some(TokenUsage::new(8, 6)));

        let wrapped = json!({"response": {"usageMetadata": {"promptTokenCount": 3}}});
        assert_eq!(extract_usage(&wrapped), Some(TokenUsage::new(3, 0)));
    }

    #[test]
    fn ignores_events_without_usage() {
        assert_eq!(extract_usage(&json!({"type": "ping"})), None);
        assert_eq!(extract_usage(&json!({"usage": null})), None);
    }
}
