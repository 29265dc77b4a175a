//! Request shaping per provider family
//!
//! A [`ModelAdapter`] turns the canonical request into a provider payload
//! and post-processes streamed text. [`Adapter`] is the closed set of
//! families the gateway dispatches over.

mod gemini;
mod markup;
mod openai;
mod passthrough;

pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;
pub use passthrough::PassthroughAdapter;

use crate::protocol::ProviderPayload;
use crate::types::{AdapterResult, Message, MessagesRequest};

/// Predicate selecting which canonical messages reach the provider
pub type MessageFilter = dyn Fn(&Message) -> bool + Send + Sync;

/// Descriptions longer than this are cut when summarizing
const SUMMARY_MAX_CHARS: usize = 200;

/// Translation between the canonical format and one provider family
pub trait ModelAdapter {
    /// Provider message shape
    type Message;
    /// Provider tool definition shape
    type Tool;
    /// Provider request body
    type Payload: Into<ProviderPayload>;

    /// Whether this adapter claims `model_id` when no provider is named
    fn should_handle(&self, model_id: &str) -> bool;

    /// Process one streamed text delta given the text seen before it
    ///
    /// `accumulated` only needs to hold what [`withheld_text`](Self::withheld_text)
    /// kept back; earlier, fully resolved text has no effect.
    fn process_text_content(&self, fragment: &str, accumulated: &str) -> AdapterResult;

    /// Tail of the streamed text not yet released as visible text
    fn withheld_text<'a>(&self, _accumulated: &'a str) -> &'a str {
        ""
    }

    /// Map canonical messages to provider messages, preserving order
    fn convert_messages(&self, request: &MessagesRequest, filter: Option<&MessageFilter>) -> Vec<Self::Message>;

    /// Map canonical tools to provider tools
    ///
    /// With `summarize`, descriptions are cut to their first sentence.
    fn convert_tools(&self, request: &MessagesRequest, summarize: bool) -> Vec<Self::Tool>;

    /// Assemble the request body, omitting absent optional fields
    fn build_payload(
        &self,
        request: &MessagesRequest,
        messages: Vec<Self::Message>,
        tools: Vec<Self::Tool>,
    ) -> Self::Payload;

    /// Context window in tokens
    fn context_window(&self) -> u32;

    fn supports_vision(&self) -> bool;
}

/// Closed set of adapter families
#[derive(Debug, Clone)]
pub enum Adapter {
    /// Provider speaks the canonical format
    Passthrough(PassthroughAdapter),
    /// OpenAI Chat Completions
    OpenAi(OpenAiAdapter),
    /// Google Gemini
    Gemini(GeminiAdapter),
}

/// Dispatch a method call to whichever adapter variant is active
macro_rules! dispatch {
    ($self:expr, $adapter:ident => $call:expr) => {
        match $self {
            Adapter::Passthrough($adapter) => $call,
            Adapter::OpenAi($adapter) => $call,
            Adapter::Gemini($adapter) => $call,
        }
    };
}

impl Adapter {
    /// Run message conversion, tool conversion and payload assembly
    pub fn prepare(&self, request: &MessagesRequest, filter: Option<&MessageFilter>, summarize: bool) -> ProviderPayload {
        dispatch!(self, adapter => {
            let messages = adapter.convert_messages(request, filter);
            let tools = adapter.convert_tools(request, summarize);
            adapter.build_payload(request, messages, tools).into()
        })
    }

    pub fn should_handle(&self, model_id: &str) -> bool {
        dispatch!(self, adapter => adapter.should_handle(model_id))
    }

    pub fn process_text_content(&self, fragment: &str, accumulated: &str) -> AdapterResult {
        dispatch!(self, adapter => adapter.process_text_content(fragment, accumulated))
    }

    pub fn withheld_text<'a>(&self, accumulated: &'a str) -> &'a str {
        dispatch!(self, adapter => adapter.withheld_text(accumulated))
    }

    pub fn context_window(&self) -> u32 {
        dispatch!(self, adapter => adapter.context_window())
    }

    pub fn supports_vision(&self) -> bool {
        dispatch!(self, adapter => adapter.supports_vision())
    }
}

/// Canonical messages that pass `filter`, in order
fn filtered<'a>(request: &'a MessagesRequest, filter: Option<&'a MessageFilter>) -> impl Iterator<Item = &'a Message> {
    request
        .messages
        .iter()
        .filter(move |m| filter.is_none_or(|keep| keep(*m)))
}

/// Cut a tool description to its first sentence, capped in length
pub fn summarize_description(description: &str) -> String {
    let trimmed = description.trim();
    let sentence = trimmed
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | '!' | '?')
                && trimmed[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .is_none_or(char::is_whitespace)
        })
        .map_or(trimmed, |(i, c)| &trimmed[..i + c.len_utf8()]);
    let sentence = sentence.lines().next().unwrap_or_default();

    if sentence.chars().count() <= SUMMARY_MAX_CHARS {
        return sentence.to_owned();
    }

    let mut cut: String = sentence.chars().take(SUMMARY_MAX_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

fn description_for(description: Option<&String>, summarize: bool) -> Option<String> {
    description.map(|d| if summarize { summarize_description(d) } else { d.clone() })
}
