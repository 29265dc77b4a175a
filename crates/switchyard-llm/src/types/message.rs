use serde::{Deserialize, Serialize};

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human turn
    User,
    /// Model turn
    Assistant,
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the turn
    pub role: Role,
    /// Turn content
    pub content: MessageContent,
}

impl Message {
    /// Build a plain-text message
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Message content: a plain string or a list of content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Shorthand for a single text block
    Text(String),
    /// Structured content blocks
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Content as a list of blocks, expanding the string shorthand
    pub fn to_blocks(&self) -> Vec<ContentBlock> {
        match self {
            Self::Text(text) => vec![ContentBlock::text(text.clone())],
            Self::Blocks(blocks) => blocks.clone(),
        }
    }

    /// Concatenated text of all text blocks
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => joined_text(blocks),
        }
    }
}

/// Content block within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content
    Text {
        /// The text string
        text: String,
        /// Prompt caching marker, forwarded untouched
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<serde_json::Value>,
    },
    /// Image content
    Image {
        /// Image source
        source: ImageSource,
    },
    /// Tool invocation by the assistant
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as JSON
        input: serde_json::Value,
    },
    /// Tool output supplied by the user
    ToolResult {
        /// Tool use ID this result responds to
        tool_use_id: String,
        /// Result content
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
        /// Whether the tool call errored
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Extended thinking emitted by the model
    Thinking {
        /// Reasoning text
        thinking: String,
        /// Integrity signature
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Thinking withheld by the provider
    RedactedThinking {
        /// Opaque payload
        data: String,
    },
}

impl ContentBlock {
    /// Build a text block
    pub const fn text(text: String) -> Self {
        Self::Text {
            text,
            cache_control: None,
        }
    }
}

/// Image source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Inline base64 data
    Base64 {
        /// MIME type (e.g. "image/png")
        media_type: String,
        /// Base64-encoded bytes
        data: String,
    },
    /// Remote image
    Url {
        /// Image URL
        url: String,
    },
}

impl ImageSource {
    /// Render as a URL, using a data URI for inline images
    pub fn to_url(&self) -> String {
        match self {
            Self::Base64 { media_type, data } => format!("data:{media_type};base64,{data}"),
            Self::Url { url } => url.clone(),
        }
    }
}

/// Tool result payload: a string or content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Plain text result
    Text(String),
    /// Structured result
    Blocks(Vec<ContentBlock>),
}

impl ToolResultContent {
    /// Concatenated text of the result
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => joined_text(blocks),
        }
    }
}

fn joined_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt: a string or text blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// Plain text
    Text(String),
    /// Text blocks (may carry cache markers)
    Blocks(Vec<ContentBlock>),
}

impl SystemPrompt {
    /// Concatenated system text
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => joined_text(blocks),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn string_content_round_trips_as_string() {
        let msg: Message = serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(msg, Message::text(Role::User, "hi"));
        assert_eq!(serde_json::to_value(&msg).unwrap(), json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn parses_mixed_blocks() {
        let msg: Message = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": [{"type": "text", "text": "42"}]},
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AAAA"}},
                {"type": "text", "text": "thanks", "cache_control": {"type": "ephemeral"}}
            ]
        }))
        .unwrap();

        let blocks = msg.content.to_blocks();
        assert_eq!(blocks.len(), 3);
        let ContentBlock::ToolResult { content: Some(content), .. } = &blocks[0] else {
            panic!("expected tool result");
        };
        assert_eq!(content.as_text(), "42");
        let ContentBlock::Image { source } = &blocks[1] else {
            panic!("expected image");
        };
        assert_eq!(source.to_url(), "data:image/png;base64,AAAA");
        assert_eq!(msg.content.as_text(), "thanks");
    }

    #[test]
    fn system_blocks_join_text() {
        let system: SystemPrompt = serde_json::from_value(json!([
            {"type": "text", "text": "You are terse."},
            {"type": "text", "text": "Answer in English."}
        ]))
        .unwrap();
        assert_eq!(system.as_text(), "You are terse.\nAnswer in English.");
    }
}
