//! Upstream wire formats

pub mod anthropic;
pub mod google;
pub mod openai;

use serde::Serialize;

use self::anthropic::{AnthropicPayload, VertexAnthropicPayload};
use self::google::{CodeAssistEnvelope, GeminiPayload};
use self::openai::OpenAiRequest;

/// Request body in the shape a specific provider expects
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProviderPayload {
    /// Anthropic Messages body
    Anthropic(AnthropicPayload),
    /// Anthropic Messages body for Vertex `rawPredict`
    VertexAnthropic(VertexAnthropicPayload),
    /// OpenAI Chat Completions body
    OpenAi(OpenAiRequest),
    /// Gemini `generateContent` body
    Gemini(GeminiPayload),
    /// Gemini body wrapped for the Code Assist endpoint
    CodeAssist(CodeAssistEnvelope),
}

impl ProviderPayload {
    /// Short label used in logs and error messages
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Anthropic(_) => "anthropic",
            Self::VertexAnthropic(_) => "vertex-anthropic",
            Self::OpenAi(_) => "openai",
            Self::Gemini(_) => "gemini",
            Self::CodeAssist(_) => "code-assist",
        }
    }
}
