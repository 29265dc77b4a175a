use serde::{Deserialize, Serialize};

/// Tool made available to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool input
    pub input_schema: serde_json::Value,
}

/// How the model may choose tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides
    Auto,
    /// Model must call some tool
    Any,
    /// Model must call the named tool
    Tool {
        /// Tool name
        name: String,
    },
    /// Model must not call tools
    None,
}

/// Fresh identifier in the canonical `toolu_` style
pub fn tool_use_id() -> String {
    format!("toolu_{}", uuid::Uuid::new_v4().simple())
}

/// A tool invocation recovered from model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Invocation identifier
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool arguments as JSON
    pub arguments: serde_json::Value,
}
