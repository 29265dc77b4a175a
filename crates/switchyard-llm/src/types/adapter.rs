use super::ToolCall;

/// Result of running a streamed text fragment through an adapter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterResult {
    /// Text to show the caller
    pub cleaned_text: String,
    /// Tool calls recovered from the fragment
    pub tool_calls: Vec<ToolCall>,
    /// Whether the fragment differs from `cleaned_text`
    pub was_transformed: bool,
}

impl AdapterResult {
    /// The fragment, unchanged
    pub fn unchanged(fragment: &str) -> Self {
        Self {
            cleaned_text: fragment.to_owned(),
            tool_calls: Vec::new(),
            was_transformed: false,
        }
    }
}
