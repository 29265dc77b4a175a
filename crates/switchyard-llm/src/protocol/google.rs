//! Google Gemini and Code Assist wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Gemini `generateContent` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    /// Conversation contents
    pub contents: Vec<GoogleContent>,
    /// System instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GoogleContent>,
    /// Generation configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GoogleGenerationConfig>,
    /// Tool definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GoogleTool>>,
    /// Tool configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<GoogleToolConfig>,
}

/// Gemini request body; the model is carried in the URL
#[derive(Debug, Clone, Serialize)]
pub struct GeminiPayload {
    /// Model the body was built for
    #[serde(skip)]
    pub model: String,
    /// Request body
    #[serde(flatten)]
    pub request: GoogleRequest,
}

/// Code Assist wrapper around a Gemini request
#[derive(Debug, Clone, Serialize)]
pub struct CodeAssistEnvelope {
    /// Model identifier
    pub model: String,
    /// Google Cloud project
    pub project: String,
    /// Fresh identifier per request
    pub user_prompt_id: String,
    /// Wrapped Gemini request
    pub request: GoogleRequest,
}

/// Content object containing role and parts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleContent {
    /// Role ("user" or "model")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default)]
    pub parts: Vec<GooglePart>,
}

/// Individual part within a content object
///
/// Exactly one payload field is set on a well-formed part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePart {
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Marks `text` as model reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    /// Inline data (e.g. images)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GoogleInlineData>,
    /// Function call from the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GoogleFunctionCall>,
    /// Function response from the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GoogleFunctionResponse>,
}

impl GooglePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Inline binary data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleInlineData {
    /// MIME type (e.g. "image/png")
    pub mime_type: String,
    /// Base64-encoded data
    pub data: String,
}

/// Function call from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleFunctionCall {
    /// Function name
    pub name: String,
    /// Function arguments as JSON
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Function response from the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleFunctionResponse {
    /// Function name
    pub name: String,
    /// Response content as JSON
    pub response: serde_json::Value,
}

/// Generation configuration parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGenerationConfig {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Reasoning controls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<GoogleThinkingConfig>,
}

/// Reasoning controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleThinkingConfig {
    /// Token budget for reasoning (0 disables it)
    pub thinking_budget: u32,
    /// Stream reasoning back as thought parts
    pub include_thoughts: bool,
}

/// Tool definition wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTool {
    /// Function declarations
    pub function_declarations: Vec<GoogleFunctionDeclaration>,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleFunctionDeclaration {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Tool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleToolConfig {
    /// Function calling config
    pub function_calling_config: GoogleFunctionCallingConfig,
}

/// Function calling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleFunctionCallingConfig {
    /// Mode: "AUTO", "ANY", "NONE"
    pub mode: String,
    /// Allowed function names (when mode is "ANY")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_function_names: Option<Vec<String>>,
}

// -- Response types --

/// One streamed `generateContent` response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResponse {
    /// Generated candidates
    #[serde(default)]
    pub candidates: Vec<GoogleCandidate>,
    /// Response identifier
    #[serde(default)]
    pub response_id: Option<String>,
}

/// Code Assist stream chunk, which nests the Gemini response
#[derive(Debug, Clone, Deserialize)]
pub struct CodeAssistChunk {
    /// Wrapped Gemini response
    pub response: GoogleResponse,
}

/// Generated candidate
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCandidate {
    /// Generated content
    #[serde(default)]
    pub content: GoogleContent,
    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response to `loadCodeAssist`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadCodeAssistResponse {
    /// Project assigned to the account, as an id or an object
    #[serde(default)]
    pub cloudaicompanion_project: Option<CompanionProject>,
}

/// Project reference returned by `loadCodeAssist`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CompanionProject {
    /// Bare project id
    Id(String),
    /// Project object
    Object {
        /// Project id
        id: String,
    },
}

impl CompanionProject {
    pub fn into_id(self) -> String {
        match self {
            Self::Id(id) | Self::Object { id } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_thought_part() {
        let part: GooglePart = serde_json::from_value(json!({"text": "pondering", "thought": true})).unwrap();
        assert_eq!(part.text.as_deref(), Some("pondering"));
        assert_eq!(part.thought, Some(true));
    }

    #[test]
    fn gemini_payload_omits_model() {
        let payload = GeminiPayload {
            model: "gemini-2.5-pro".to_owned(),
            request: GoogleRequest {
                contents: vec![GoogleContent {
                    role: Some("user".to_owned()),
                    parts: vec![GooglePart::text("hi")],
                }],
                ..GoogleRequest::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]})
        );
    }

    #[test]
    fn companion_project_accepts_both_shapes() {
        let bare: LoadCodeAssistResponse =
            serde_json::from_value(json!({"cloudaicompanionProject": "proj-1"})).unwrap();
        assert_eq!(bare.cloudaicompanion_project.unwrap().into_id(), "proj-1");

        let object: LoadCodeAssistResponse =
            serde_json::from_value(json!({"cloudaicompanionProject": {"id": "proj-2", "name": "x"}})).unwrap();
        assert_eq!(object.cloudaicompanion_project.unwrap().into_id(), "proj-2");
    }
}
