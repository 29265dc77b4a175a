use super::{MessageFilter, ModelAdapter, filtered};
use crate::protocol::ProviderPayload;
use crate::protocol::anthropic::{AnthropicBody, AnthropicPayload};
use crate::types::{AdapterResult, Message, MessagesRequest, ToolDefinition};

/// Context window when the vendor is not recognised
const DEFAULT_CONTEXT_WINDOW: u32 = 200_000;

/// Context windows of vendors serving the canonical format, by name fragment
const VENDOR_CONTEXT_WINDOWS: &[(&str, u32)] = &[
    ("anthropic", 200_000),
    ("zai", 128_000),
    ("glm", 128_000),
    ("kimi", 262_144),
    ("moonshot", 262_144),
    ("minimax", 204_800),
    ("deepseek", 128_000),
];

/// Vendors without image input
const TEXT_ONLY_VENDORS: &[&str] = &["deepseek"];

/// Adapter for providers that natively speak the canonical format
///
/// Requests and streamed text pass through unchanged; the vendor name only
/// selects static capabilities.
#[derive(Debug, Clone)]
pub struct PassthroughAdapter {
    vendor: String,
}

impl PassthroughAdapter {
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into().to_ascii_lowercase(),
        }
    }
}

impl ModelAdapter for PassthroughAdapter {
    type Message = Message;
    type Tool = ToolDefinition;
    type Payload = AnthropicPayload;

    fn should_handle(&self, _model_id: &str) -> bool {
        false
    }

    fn process_text_content(&self, fragment: &str, _accumulated: &str) -> AdapterResult {
        AdapterResult::unchanged(fragment)
    }

    fn convert_messages(&self, request: &MessagesRequest, filter: Option<&MessageFilter>) -> Vec<Message> {
        filtered(request, filter).cloned().collect()
    }

    fn convert_tools(&self, request: &MessagesRequest, _summarize: bool) -> Vec<ToolDefinition> {
        request.tools.clone().unwrap_or_default()
    }

    fn build_payload(
        &self,
        request: &MessagesRequest,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> AnthropicPayload {
        AnthropicPayload {
            model: request.model.clone(),
            body: AnthropicBody {
                messages,
                max_tokens: request.max_tokens_or_default(),
                stream: true,
                system: request.system.clone(),
                tools: (!tools.is_empty()).then_some(tools),
                tool_choice: request.tool_choice.clone(),
                temperature: request.temperature,
                top_p: request.top_p,
                top_k: request.top_k,
                stop_sequences: request.stop_sequences.clone(),
                thinking: request.thinking.clone(),
                metadata: request.metadata.clone(),
            },
        }
    }

    fn context_window(&self) -> u32 {
        VENDOR_CONTEXT_WINDOWS
            .iter()
            .find(|(fragment, _)| self.vendor.contains(fragment))
            .map_or(DEFAULT_CONTEXT_WINDOW, |&(_, window)| window)
    }

    fn supports_vision(&self) -> bool {
        !TEXT_ONLY_VENDORS.iter().any(|v| self.vendor.contains(v))
    }
}

impl From<AnthropicPayload> for ProviderPayload {
    fn from(payload: AnthropicPayload) -> Self {
        Self::Anthropic(payload)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::adapter::Adapter;
    use crate::types::{Role, ThinkingConfig};

    fn request(value: serde_json::Value) -> MessagesRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn minimal_request_builds_minimal_payload() {
        let req = request(json!({"model": "x", "messages": [{"role": "user", "content": "hi"}]}));
        let payload = Adapter::Passthrough(PassthroughAdapter::new("anthropic")).prepare(&req, None, false);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "model": "x",
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 4096,
                "stream": true
            })
        );
    }

    #[test]
    fn optional_fields_forwarded_when_present() {
        let mut req = request(json!({
            "model": "glm-4.6",
            "max_tokens": 1024,
            "system": "be brief",
            "temperature": 0.2,
            "stop_sequences": ["END"],
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{"name": "ls", "description": "List files. Long text.", "input_schema": {"type": "object"}}],
            "tool_choice": {"type": "auto"},
            "metadata": {"user_id": "u-1"}
        }));
        req.thinking = Some(ThinkingConfig::Enabled { budget_tokens: 2048 });

        let value = serde_json::to_value(Adapter::Passthrough(PassthroughAdapter::new("zai")).prepare(&req, None, true))
            .unwrap();

        assert_eq!(value["max_tokens"], 1024);
        assert_eq!(value["system"], "be brief");
        assert_eq!(value["temperature"], 0.2);
        assert_eq!(value["stop_sequences"], json!(["END"]));
        assert_eq!(value["tool_choice"], json!({"type": "auto"}));
        assert_eq!(value["thinking"], json!({"type": "enabled", "budget_tokens": 2048}));
        assert_eq!(value["metadata"], json!({"user_id": "u-1"}));
        // tools are forwarded verbatim, even when summarizing is requested
        assert_eq!(value["tools"][0]["description"], "List files. Long text.");
        assert!(value.get("top_p").is_none());
    }

    #[test]
    fn messages_pass_through_in_order() {
        let req = request(json!({
            "model": "kimi-k2",
            "messages": [
                {"role": "user", "content": "one"},
                {"role": "assistant", "content": [{"type": "text", "text": "two"}]},
                {"role": "user", "content": "three"}
            ]
        }));
        let adapter = PassthroughAdapter::new("kimi");

        assert_eq!(adapter.convert_messages(&req, None), req.messages);
    }

    #[test]
    fn filter_drops_messages_without_reordering() {
        let req = request(json!({
            "model": "x",
            "messages": [
                {"role": "user", "content": "one"},
                {"role": "assistant", "content": "two"},
                {"role": "user", "content": "three"}
            ]
        }));
        let only_user = |m: &Message| m.role == Role::User;

        let kept = PassthroughAdapter::new("anthropic").convert_messages(&req, Some(&only_user as &MessageFilter));
        let texts: Vec<_> = kept.iter().map(|m| m.content.as_text()).collect();
        assert_eq!(texts, ["one", "three"]);
    }

    #[test]
    fn text_fragments_are_identity() {
        let adapter = PassthroughAdapter::new("minimax");
        for fragment in ["", "plain", "<tool_call>{\"name\":\"x\"}</tool_call>", "ü🦀"] {
            let result = adapter.process_text_content(fragment, "<tool_call>");
            assert_eq!(result.cleaned_text, fragment);
            assert!(!result.was_transformed);
            assert!(result.tool_calls.is_empty());
        }
    }

    #[test]
    fn never_claims_models() {
        let adapter = PassthroughAdapter::new("anthropic");
        assert!(!adapter.should_handle("claude-sonnet-4-5"));
        assert!(!adapter.should_handle("gpt-4o"));
    }

    #[test]
    fn context_window_by_vendor() {
        assert_eq!(PassthroughAdapter::new("Kimi").context_window(), 262_144);
        assert_eq!(PassthroughAdapter::new("minimax-cn").context_window(), 204_800);
        assert_eq!(PassthroughAdapter::new("zai").context_window(), 128_000);
        assert_eq!(PassthroughAdapter::new("someone-else").context_window(), DEFAULT_CONTEXT_WINDOW);
        assert!(!PassthroughAdapter::new("deepseek").supports_vision());
        assert!(PassthroughAdapter::new("anthropic").supports_vision());
    }
}
