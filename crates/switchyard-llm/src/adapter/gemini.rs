use std::collections::HashMap;

use serde_json::{Value, json};

use super::{MessageFilter, ModelAdapter, description_for, filtered};
use crate::protocol::ProviderPayload;
use crate::protocol::google::{
    GeminiPayload, GoogleContent, GoogleFunctionCall, GoogleFunctionCallingConfig, GoogleFunctionDeclaration,
    GoogleFunctionResponse, GoogleGenerationConfig, GoogleInlineData, GooglePart, GoogleRequest, GoogleThinkingConfig,
    GoogleTool, GoogleToolConfig,
};
use crate::types::{AdapterResult, ContentBlock, ImageSource, MessagesRequest, Role, ThinkingConfig, ToolChoice};

const CONTEXT_WINDOW: u32 = 1_048_576;

/// JSON Schema keywords the Gemini API rejects
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

/// Adapter for the Gemini `generateContent` family (Code Assist, Vertex)
#[derive(Debug, Clone, Default)]
pub struct GeminiAdapter;

impl GeminiAdapter {
    pub const fn new() -> Self {
        Self
    }
}

impl ModelAdapter for GeminiAdapter {
    type Message = GoogleContent;
    type Tool = GoogleFunctionDeclaration;
    type Payload = GeminiPayload;

    fn should_handle(&self, model_id: &str) -> bool {
        let model = model_id.to_ascii_lowercase();
        model.strip_prefix("google/").unwrap_or(&model).starts_with("gemini-")
    }

    fn process_text_content(&self, fragment: &str, _accumulated: &str) -> AdapterResult {
        AdapterResult::unchanged(fragment)
    }

    fn convert_messages(&self, request: &MessagesRequest, filter: Option<&MessageFilter>) -> Vec<GoogleContent> {
        // function responses must name the function; recover it from the call
        let tool_names: HashMap<String, String> = request
            .messages
            .iter()
            .flat_map(|m| m.content.to_blocks())
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, .. } => Some((id, name)),
                _ => None,
            })
            .collect();

        filtered(request, filter)
            .filter_map(|message| {
                let role = match message.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                let parts: Vec<GooglePart> = message
                    .content
                    .to_blocks()
                    .into_iter()
                    .filter_map(|block| block_to_part(block, &tool_names))
                    .collect();

                (!parts.is_empty()).then(|| GoogleContent {
                    role: Some(role.to_owned()),
                    parts,
                })
            })
            .collect()
    }

    fn convert_tools(&self, request: &MessagesRequest, summarize: bool) -> Vec<GoogleFunctionDeclaration> {
        request
            .tools
            .iter()
            .flatten()
            .map(|tool| GoogleFunctionDeclaration {
                name: tool.name.clone(),
                description: description_for(tool.description.as_ref(), summarize),
                parameters: Some(sanitize_schema(tool.input_schema.clone())),
            })
            .collect()
    }

    fn build_payload(
        &self,
        request: &MessagesRequest,
        messages: Vec<GoogleContent>,
        tools: Vec<GoogleFunctionDeclaration>,
    ) -> GeminiPayload {
        let has_tools = !tools.is_empty();

        let system_instruction = request
            .system
            .as_ref()
            .map(crate::types::SystemPrompt::as_text)
            .filter(|text| !text.is_empty())
            .map(|text| GoogleContent {
                role: None,
                parts: vec![GooglePart::text(text)],
            });

        let thinking_config = match request.thinking {
            Some(ThinkingConfig::Enabled { budget_tokens }) => Some(GoogleThinkingConfig {
                thinking_budget: budget_tokens,
                include_thoughts: true,
            }),
            Some(ThinkingConfig::Disabled) | None => None,
        };

        let generation_config = GoogleGenerationConfig {
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: request.top_k,
            max_output_tokens: Some(request.max_tokens_or_default()),
            stop_sequences: request.stop_sequences.clone(),
            thinking_config,
        };

        let tool_config = request
            .tool_choice
            .as_ref()
            .filter(|_| has_tools)
            .map(|choice| {
                let (mode, allowed) = match choice {
                    ToolChoice::Auto => ("AUTO", None),
                    ToolChoice::Any => ("ANY", None),
                    ToolChoice::None => ("NONE", None),
                    ToolChoice::Tool { name } => ("ANY", Some(vec![name.clone()])),
                };
                GoogleToolConfig {
                    function_calling_config: GoogleFunctionCallingConfig {
                        mode: mode.to_owned(),
                        allowed_function_names: allowed,
                    },
                }
            });

        GeminiPayload {
            model: request.model.clone(),
            request: GoogleRequest {
                contents: messages,
                system_instruction,
                generation_config: Some(generation_config),
                tools: has_tools.then(|| {
                    vec![GoogleTool {
                        function_declarations: tools,
                    }]
                }),
                tool_config,
            },
        }
    }

    fn context_window(&self) -> u32 {
        CONTEXT_WINDOW
    }

    fn supports_vision(&self) -> bool {
        true
    }
}

impl From<GeminiPayload> for ProviderPayload {
    fn from(payload: GeminiPayload) -> Self {
        Self::Gemini(payload)
    }
}

fn block_to_part(block: ContentBlock, tool_names: &HashMap<String, String>) -> Option<GooglePart> {
    match block {
        ContentBlock::Text { text, .. } => (!text.is_empty()).then(|| GooglePart::text(text)),
        ContentBlock::Image {
            source: ImageSource::Base64 { media_type, data },
        } => Some(GooglePart {
            inline_data: Some(GoogleInlineData {
                mime_type: media_type,
                data,
            }),
            ..GooglePart::default()
        }),
        ContentBlock::Image {
            source: ImageSource::Url { url },
        } => {
            tracing::debug!(url = %url, "dropping remote image unsupported by gemini");
            None
        }
        ContentBlock::ToolUse { name, input, .. } => Some(GooglePart {
            function_call: Some(GoogleFunctionCall { name, args: input }),
            ..GooglePart::default()
        }),
        ContentBlock::ToolResult {
            tool_use_id, content, ..
        } => {
            let name = tool_names.get(&tool_use_id).cloned().unwrap_or(tool_use_id);
            let output = content.map(|c| c.as_text()).unwrap_or_default();
            Some(GooglePart {
                function_response: Some(GoogleFunctionResponse {
                    name,
                    response: json!({ "content": output }),
                }),
                ..GooglePart::default()
            })
        }
        ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => None,
    }
}

/// Strip schema keywords Gemini does not accept, at every depth
fn sanitize_schema(mut schema: Value) -> Value {
    match schema {
        Value::Object(ref mut map) => {
            for key in UNSUPPORTED_SCHEMA_KEYS {
                map.remove(*key);
            }
            for value in map.values_mut() {
                *value = sanitize_schema(value.take());
            }
        }
        Value::Array(ref mut items) => {
            for item in items.iter_mut() {
                *item = sanitize_schema(item.take());
            }
        }
        _ => {}
    }
    schema
}
