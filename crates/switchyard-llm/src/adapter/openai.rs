use serde_json::json;

use super::{MessageFilter, ModelAdapter, description_for, filtered, markup};
use crate::protocol::ProviderPayload;
use crate::protocol::openai::{
    OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiFunctionCall, OpenAiImageUrl, OpenAiMessage,
    OpenAiRequest, OpenAiTool, OpenAiToolCall, StreamOptions,
};
use crate::types::{AdapterResult, ContentBlock, Message, MessagesRequest, Role, ToolChoice};

/// Model prefixes this adapter claims
const CLAIMED_PREFIXES: &[&str] = &["gpt-", "o1", "o3", "o4", "chatgpt-"];

const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;

/// Context windows by model name fragment, most specific first
const MODEL_CONTEXT_WINDOWS: &[(&str, u32)] = &[
    ("gpt-4.1", 1_047_576),
    ("gpt-5", 400_000),
    ("o1", 200_000),
    ("o3", 200_000),
    ("o4", 200_000),
    ("kimi", 262_144),
    ("gpt-4o", 128_000),
    ("gpt-3.5", 16_385),
];

/// Adapter for OpenAI Chat Completions and compatible APIs
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    model: String,
}

impl OpenAiAdapter {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into().to_ascii_lowercase(),
        }
    }
}

impl ModelAdapter for OpenAiAdapter {
    type Message = OpenAiMessage;
    type Tool = OpenAiTool;
    type Payload = OpenAiRequest;

    fn should_handle(&self, model_id: &str) -> bool {
        let model = model_id.to_ascii_lowercase();
        let model = model.strip_prefix("openai/").unwrap_or(&model);
        CLAIMED_PREFIXES.iter().any(|p| model.starts_with(p))
    }

    fn process_text_content(&self, fragment: &str, accumulated: &str) -> AdapterResult {
        markup::extract(fragment, accumulated)
    }

    fn withheld_text<'a>(&self, accumulated: &'a str) -> &'a str {
        markup::withheld(accumulated)
    }

    fn convert_messages(&self, request: &MessagesRequest, filter: Option<&MessageFilter>) -> Vec<OpenAiMessage> {
        let mut out = Vec::new();

        if let Some(ref system) = request.system {
            let text = system.as_text();
            if !text.is_empty() {
                out.push(OpenAiMessage::new("system", Some(OpenAiContent::Text(text))));
            }
        }

        for message in filtered(request, filter) {
            match message.role {
                Role::User => push_user(&mut out, message),
                Role::Assistant => out.push(assistant_message(message)),
            }
        }

        out
    }

    fn convert_tools(&self, request: &MessagesRequest, summarize: bool) -> Vec<OpenAiTool> {
        request
            .tools
            .iter()
            .flatten()
            .map(|tool| OpenAiTool {
                tool_type: "function".to_owned(),
                function: OpenAiFunction {
                    name: tool.name.clone(),
                    description: description_for(tool.description.as_ref(), summarize),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect()
    }

    fn build_payload(
        &self,
        request: &MessagesRequest,
        messages: Vec<OpenAiMessage>,
        tools: Vec<OpenAiTool>,
    ) -> OpenAiRequest {
        let has_tools = !tools.is_empty();

        OpenAiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens_or_default(),
            stream: true,
            stream_options: StreamOptions { include_usage: true },
            tools: has_tools.then_some(tools),
            tool_choice: request.tool_choice.as_ref().filter(|_| has_tools).map(tool_choice),
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop_sequences.clone(),
            user: request.metadata.as_ref().and_then(|m| m.user_id.clone()),
        }
    }

    fn context_window(&self) -> u32 {
        MODEL_CONTEXT_WINDOWS
            .iter()
            .find(|(fragment, _)| self.model.contains(fragment))
            .map_or(DEFAULT_CONTEXT_WINDOW, |&(_, window)| window)
    }

    fn supports_vision(&self) -> bool {
        !self.model.contains("gpt-3.5")
    }
}

impl From<OpenAiRequest> for ProviderPayload {
    fn from(payload: OpenAiRequest) -> Self {
        Self::OpenAi(payload)
    }
}

/// Append a user turn, splitting tool results into `tool` messages in place
fn push_user(out: &mut Vec<OpenAiMessage>, message: &Message) {
    let mut parts = Vec::new();

    for block in message.content.to_blocks() {
        match block {
            ContentBlock::Text { text, .. } => parts.push(OpenAiContentPart::Text { text }),
            ContentBlock::Image { source } => parts.push(OpenAiContentPart::ImageUrl {
                image_url: OpenAiImageUrl { url: source.to_url() },
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                flush_user_parts(out, &mut parts);
                let mut text = content.map(|c| c.as_text()).unwrap_or_default();
                if is_error == Some(true) {
                    text = format!("Error: {text}");
                }
                out.push(OpenAiMessage {
                    tool_call_id: Some(tool_use_id),
                    ..OpenAiMessage::new("tool", Some(OpenAiContent::Text(text)))
                });
            }
            ContentBlock::ToolUse { .. } | ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => {}
        }
    }

    flush_user_parts(out, &mut parts);
}

fn flush_user_parts(out: &mut Vec<OpenAiMessage>, parts: &mut Vec<OpenAiContentPart>) {
    if parts.is_empty() {
        return;
    }

    let content = match parts.as_slice() {
        [OpenAiContentPart::Text { text }] => OpenAiContent::Text(text.clone()),
        _ => OpenAiContent::Parts(parts.clone()),
    };
    parts.clear();
    out.push(OpenAiMessage::new("user", Some(content)));
}

fn assistant_message(message: &Message) -> OpenAiMessage {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in message.content.to_blocks() {
        match block {
            ContentBlock::Text { text: t, .. } => text.push_str(&t),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(OpenAiToolCall {
                id,
                call_type: "function".to_owned(),
                function: OpenAiFunctionCall {
                    name,
                    arguments: input.to_string(),
                },
            }),
            _ => {}
        }
    }

    OpenAiMessage {
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        ..OpenAiMessage::new("assistant", (!text.is_empty()).then_some(OpenAiContent::Text(text)))
    }
}

fn tool_choice(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Any => json!("required"),
        ToolChoice::None => json!("none"),
        ToolChoice::Tool { name } => json!({"type": "function", "function": {"name": name}}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;

    fn request(value: serde_json::Value) -> MessagesRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn claims_openai_model_families() {
        let adapter = OpenAiAdapter::new("gpt-4o");
        for model in ["gpt-4o", "GPT-4.1-mini", "o3-mini", "o4-mini", "chatgpt-4o-latest", "openai/gpt-5"] {
            assert!(adapter.should_handle(model), "{model}");
        }
        for model in ["claude-sonnet-4-5", "gemini-2.5-pro", "kimi-k2"] {
            assert!(!adapter.should_handle(model), "{model}");
        }
    }

    #[test]
    fn builds_chat_completions_payload() {
        let req = request(json!({
            "model": "gpt-4o",
            "system": [{"type": "text", "text": "be brief"}],
            "messages": [{"role": "user", "content": "hi"}],
            "metadata": {"user_id": "u-9"}
        }));

        let payload = Adapter::OpenAi(OpenAiAdapter::new("gpt-4o")).prepare(&req, None, false);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "max_tokens": 4096,
                "stream": true,
                "stream_options": {"include_usage": true},
                "user": "u-9"
            })
        );
    }

    #[test]
    fn converts_tool_round_trip_in_order() {
        let req = request(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "user", "content": "list files"},
                {"role": "assistant", "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "Checking."},
                    {"type": "tool_use", "id": "call_1", "name": "ls", "input": {"dir": "."}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "call_1", "content": "a.rs"},
                    {"type": "text", "text": "and now?"}
                ]}
            ]
        }));

        let messages = OpenAiAdapter::new("gpt-4o").convert_messages(&req, None);
        let value = serde_json::to_value(&messages).unwrap();

        assert_eq!(
            value,
            json!([
                {"role": "user", "content": "list files"},
                {"role": "assistant", "content": "Checking.", "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "ls", "arguments": "{\"dir\":\".\"}"}}
                ]},
                {"role": "tool", "content": "a.rs", "tool_call_id": "call_1"},
                {"role": "user", "content": "and now?"}
            ])
        );
    }

    #[test]
    fn errored_tool_result_is_marked() {
        let req = request(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "c", "content": "boom", "is_error": true}
            ]}]
        }));
        let messages = OpenAiAdapter::new("gpt-4o").convert_messages(&req, None);
        assert_eq!(messages[0].content, Some(OpenAiContent::Text("Error: boom".to_owned())));
    }

    #[test]
    fn images_become_data_uris() {
        let req = request(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "what is this"},
                {"type": "image", "source": {"type": "base64", "media_type": "image/jpeg", "data": "Zm9v"}}
            ]}]
        }));
        let value = serde_json::to_value(OpenAiAdapter::new("gpt-4o").convert_messages(&req, None)).unwrap();
        assert_eq!(
            value[0]["content"][1],
            json!({"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,Zm9v"}})
        );
    }

    #[test]
    fn tools_and_choice_are_renamed() {
        let req = request(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{
                "name": "read",
                "description": "Read a file. Use absolute paths only.",
                "input_schema": {"type": "object", "properties": {"path": {"type": "string"}}}
            }],
            "tool_choice": {"type": "tool", "name": "read"}
        }));

        let value = serde_json::to_value(Adapter::OpenAi(OpenAiAdapter::new("gpt-4o")).prepare(&req, None, true))
            .unwrap();

        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "read");
        assert_eq!(value["tools"][0]["function"]["description"], "Read a file.");
        assert_eq!(value["tools"][0]["function"]["parameters"]["properties"]["path"]["type"], "string");
        assert_eq!(value["tool_choice"], json!({"type": "function", "function": {"name": "read"}}));
    }

    #[test]
    fn tool_choice_dropped_without_tools() {
        let req = request(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "tool_choice": {"type": "any"}
        }));
        let value = serde_json::to_value(Adapter::OpenAi(OpenAiAdapter::new("gpt-4o")).prepare(&req, None, false))
            .unwrap();
        assert!(value.get("tool_choice").is_none());
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn context_window_by_model() {
        assert_eq!(OpenAiAdapter::new("gpt-4.1-mini").context_window(), 1_047_576);
        assert_eq!(OpenAiAdapter::new("o3").context_window(), 200_000);
        assert_eq!(OpenAiAdapter::new("moonshotai/Kimi-K2").context_window(), 262_144);
        assert_eq!(OpenAiAdapter::new("llama-3.1-70b").context_window(), DEFAULT_CONTEXT_WINDOW);
    }
}
