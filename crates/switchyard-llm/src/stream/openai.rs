use super::emitter::EventEmitter;
use crate::adapter::Adapter;
use crate::protocol::anthropic::StreamEvent;
use crate::protocol::openai::{OpenAiStreamChunk, OpenAiToolCallDelta};
use crate::types::TokenUsage;

/// OpenAI Chat Completions deltas to canonical events
#[derive(Debug)]
pub(super) struct OpenAiTranslator {
    adapter: Adapter,
    emitter: EventEmitter,
    /// Text the adapter is still holding back
    pending: String,
    /// Upstream index of the tool call whose block is open
    tool_index: Option<u32>,
}

impl OpenAiTranslator {
    pub(super) fn new(adapter: Adapter, model: &str) -> Self {
        Self {
            adapter,
            emitter: EventEmitter::new(model),
            pending: String::new(),
            tool_index: None,
        }
    }

    pub(super) fn on_data(&mut self, data: &str, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        if self.emitter.is_finished() {
            return;
        }
        if data == "[DONE]" {
            self.finish(usage, out);
            return;
        }

        let Ok(chunk) = serde_json::from_str::<OpenAiStreamChunk>(data) else {
            tracing::trace!(data, "skipping unparseable chunk");
            return;
        };

        // usage-only chunks carry no choices
        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };

        self.emitter.adopt_id(chunk.id.as_deref());
        self.emitter.start(usage, out);

        if let Some(reasoning) = choice.delta.reasoning_text() {
            self.flush_pending(usage, out);
            self.tool_index = None;
            self.emitter.thinking(reasoning, usage, out);
        }

        if let Some(content) = choice.delta.content.as_deref().filter(|c| !c.is_empty()) {
            self.text(content, usage, out);
        }

        for call in choice.delta.tool_calls.into_iter().flatten() {
            self.tool_call(call, usage, out);
        }

        if let Some(reason) = choice.finish_reason.as_deref() {
            self.flush_pending(usage, out);
            self.tool_index = None;
            self.emitter.close_block(out);
            self.emitter.set_stop_reason(map_stop_reason(reason));
        }
    }

    pub(super) fn finish(&mut self, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        if self.emitter.is_finished() {
            return;
        }
        self.flush_pending(usage, out);
        self.emitter.finish(usage, out);
    }

    fn text(&mut self, fragment: &str, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        let result = self.adapter.process_text_content(fragment, &self.pending);
        let mut seen = std::mem::take(&mut self.pending);
        seen.push_str(fragment);
        self.pending = self.adapter.withheld_text(&seen).to_owned();
        self.tool_index = None;

        self.emitter.text(&result.cleaned_text, usage, out);
        for call in &result.tool_calls {
            self.emitter.tool_use(&call.id, &call.name, &call.arguments, usage, out);
        }
    }

    /// Release held-back text verbatim; the stream will not complete it
    fn flush_pending(&mut self, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        tracing::debug!(len = pending.len(), "releasing unterminated tool call markup as text");
        self.emitter.text(&pending, usage, out);
    }

    /// A call is keyed by its index; some backends repeat the id on every fragment
    fn tool_call(&mut self, call: OpenAiToolCallDelta, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        let (name, arguments) = call.function.map(|f| (f.name, f.arguments)).unwrap_or_default();
        let continues_open_call = self.tool_index == Some(call.index);

        if !continues_open_call && let Some(id) = call.id.filter(|id| !id.is_empty()) {
            self.flush_pending(usage, out);
            self.emitter.tool_start(&id, name.as_deref().unwrap_or_default(), usage, out);
            self.tool_index = Some(call.index);
        } else if !continues_open_call {
            tracing::trace!(index = call.index, "dropping fragment for unopened tool call");
            return;
        }

        if let Some(arguments) = arguments {
            self.emitter.tool_arguments(&arguments, out);
        }
    }
}

fn map_stop_reason(reason: &str) -> &'static str {
    match reason {
        "length" => "max_tokens",
        "tool_calls" | "function_call" => "tool_use",
        "content_filter" => "refusal",
        _ => "end_turn",
    }
}
