//! OpenAI Chat Completions wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Chat Completions request body
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<OpenAiMessage>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Always true; the gateway only streams
    pub stream: bool,
    /// Ask for a trailing usage chunk
    pub stream_options: StreamOptions,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    /// Tool choice (`"auto"`, `"required"`, `"none"` or a function object)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// End-user identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Streaming options
#[derive(Debug, Clone, Serialize)]
pub struct StreamOptions {
    /// Emit a final chunk carrying token usage
    pub include_usage: bool,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiMessage {
    /// "system", "user", "assistant" or "tool"
    pub role: String,
    /// Message content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAiContent>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    /// Tool call this message answers (role "tool")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl OpenAiMessage {
    pub fn new(role: &str, content: Option<OpenAiContent>) -> Self {
        Self {
            role: role.to_owned(),
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Message content: plain text or typed parts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OpenAiContent {
    /// Plain text
    Text(String),
    /// Multimodal parts
    Parts(Vec<OpenAiContentPart>),
}

/// Multimodal content part
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAiContentPart {
    /// Text part
    Text {
        /// The text string
        text: String,
    },
    /// Image part
    ImageUrl {
        /// Image reference
        image_url: OpenAiImageUrl,
    },
}

/// Image reference (URL or data URI)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiImageUrl {
    /// URL or `data:` URI
    pub url: String,
}

/// Tool call made by the assistant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiToolCall {
    /// Call identifier
    pub id: String,
    /// Always "function"
    #[serde(rename = "type")]
    pub call_type: String,
    /// Function invocation
    pub function: OpenAiFunctionCall,
}

/// Function invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiFunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// Tool definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function schema
    pub function: OpenAiFunction,
}

/// Function schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiFunction {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

// -- Streaming types --

/// One `data:` chunk of a streamed completion
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Completion identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Choices in this chunk (empty on the usage chunk)
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
}

/// Streamed choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Incremental content
    #[serde(default)]
    pub delta: OpenAiDelta,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiDelta {
    /// Text fragment
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning fragment (OpenRouter)
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Reasoning fragment (DeepSeek-style)
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Tool call fragments
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

impl OpenAiDelta {
    /// Reasoning text under whichever key the provider uses
    pub fn reasoning_text(&self) -> Option<&str> {
        self.reasoning
            .as_deref()
            .or(self.reasoning_content.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Tool call fragment
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiToolCallDelta {
    /// Position of the call within the message
    #[serde(default)]
    pub index: u32,
    /// Call identifier (first fragment only)
    #[serde(default)]
    pub id: Option<String>,
    /// Function fragment
    #[serde(default)]
    pub function: Option<OpenAiFunctionDelta>,
}

/// Function call fragment
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiFunctionDelta {
    /// Function name (first fragment only)
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments JSON fragment
    #[serde(default)]
    pub arguments: Option<String>,
}
