//! Anthropic Messages API wire format types

use serde::{Deserialize, Serialize};

use crate::types::{Message, Metadata, SystemPrompt, ThinkingConfig, TokenUsage, ToolChoice, ToolDefinition};

/// `anthropic_version` value required by Vertex `rawPredict`
pub const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

// -- Request types --

/// Anthropic Messages request body
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicPayload {
    /// Model identifier
    pub model: String,
    /// Everything except the model
    #[serde(flatten)]
    pub body: AnthropicBody,
}

/// Anthropic Messages body for Vertex, where the model lives in the URL
#[derive(Debug, Clone, Serialize)]
pub struct VertexAnthropicPayload {
    /// API version marker
    pub anthropic_version: String,
    /// Request body without `model`
    #[serde(flatten)]
    pub body: AnthropicBody,
}

impl From<AnthropicPayload> for VertexAnthropicPayload {
    fn from(payload: AnthropicPayload) -> Self {
        Self {
            anthropic_version: VERTEX_ANTHROPIC_VERSION.to_owned(),
            body: payload.body,
        }
    }
}

/// Shared Anthropic Messages fields
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicBody {
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Always true; the gateway only streams
    pub stream: bool,
    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Extended thinking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
    /// Request metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

// -- Streaming types --

/// Canonical SSE events emitted to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Stream started
    MessageStart {
        /// Partial message with metadata
        message: StreamMessage,
    },
    /// New content block started
    ContentBlockStart {
        /// Block index
        index: u32,
        /// Initial block content
        content_block: StreamContentBlock,
    },
    /// Incremental content within a block
    ContentBlockDelta {
        /// Block index
        index: u32,
        /// Delta content
        delta: StreamDelta,
    },
    /// Content block finished
    ContentBlockStop {
        /// Block index
        index: u32,
    },
    /// Message metadata delta (stop reason, usage)
    MessageDelta {
        /// Delta with stop reason
        delta: MessageDeltaBody,
        /// Usage so far
        usage: TokenUsage,
    },
    /// Stream completed
    MessageStop,
}

impl StreamEvent {
    /// SSE `event:` name
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
        }
    }

    /// Frame as `event: <type>\ndata: <json>\n\n`
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_default();
        format!("event: {}\ndata: {data}\n\n", self.event_type())
    }
}

/// Partial message in a `message_start` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Response identifier
    pub id: String,
    /// Object type, always "message"
    #[serde(rename = "type")]
    pub message_type: String,
    /// Role, always "assistant"
    pub role: String,
    /// Model
    pub model: String,
    /// Content, always empty at start
    pub content: Vec<serde_json::Value>,
    /// Stop reason, always null at start
    pub stop_reason: Option<String>,
    /// Usage known at start
    pub usage: TokenUsage,
}

impl StreamMessage {
    pub fn new(id: String, model: String, usage: TokenUsage) -> Self {
        Self {
            id,
            message_type: "message".to_owned(),
            role: "assistant".to_owned(),
            model,
            content: Vec::new(),
            stop_reason: None,
            usage,
        }
    }
}

/// Content block in a `content_block_start` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamContentBlock {
    /// Text block
    Text {
        /// Initial text (always empty)
        text: String,
    },
    /// Thinking block
    Thinking {
        /// Initial thinking (always empty)
        thinking: String,
    },
    /// Tool use block
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Initial input (always an empty object)
        input: serde_json::Value,
    },
}

/// Delta content in a `content_block_delta` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamDelta {
    /// Incremental text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Incremental thinking
    ThinkingDelta {
        /// Thinking fragment
        thinking: String,
    },
    /// Incremental tool input JSON
    InputJsonDelta {
        /// JSON fragment
        partial_json: String,
    },
}

/// Delta in a `message_delta` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    /// Stop reason
    pub stop_reason: Option<String>,
    /// Stop sequence
    pub stop_sequence: Option<String>,
}
