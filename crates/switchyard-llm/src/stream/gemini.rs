use super::emitter::EventEmitter;
use crate::adapter::Adapter;
use crate::protocol::anthropic::StreamEvent;
use crate::protocol::google::{CodeAssistChunk, GoogleResponse};
use crate::types::{TokenUsage, tool_use_id};

/// Gemini candidate chunks (bare or Code Assist wrapped) to canonical events
#[derive(Debug)]
pub(super) struct GeminiTranslator {
    adapter: Adapter,
    emitter: EventEmitter,
    accumulated: String,
}

impl GeminiTranslator {
    pub(super) fn new(adapter: Adapter, model: &str) -> Self {
        Self {
            adapter,
            emitter: EventEmitter::new(model),
            accumulated: String::new(),
        }
    }

    pub(super) fn on_data(&mut self, data: &str, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        let response = match serde_json::from_str::<CodeAssistChunk>(data) {
            Ok(chunk) => chunk.response,
            Err(_) => match serde_json::from_str::<GoogleResponse>(data) {
                Ok(response) => response,
                Err(e) => {
                    tracing::trace!(error = %e, "skipping unparseable chunk");
                    return;
                }
            },
        };

        self.emitter.adopt_id(response.response_id.as_deref());
        self.emitter.start(usage, out);

        let Some(candidate) = response.candidates.into_iter().next() else {
            return;
        };

        for part in candidate.content.parts {
            if let Some(call) = part.function_call {
                self.emitter.tool_use(&tool_use_id(), &call.name, &call.args, usage, out);
                continue;
            }
            let Some(text) = part.text else { continue };
            if part.thought == Some(true) {
                self.emitter.thinking(&text, usage, out);
            } else {
                let result = self.adapter.process_text_content(&text, &self.accumulated);
                self.accumulated.push_str(&text);
                self.emitter.text(&result.cleaned_text, usage, out);
            }
        }

        if let Some(reason) = candidate.finish_reason.as_deref() {
            self.emitter.set_stop_reason(map_finish_reason(reason));
        }
    }

    pub(super) fn finish(&mut self, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        self.emitter.finish(usage, out);
    }
}

fn map_finish_reason(reason: &str) -> &'static str {
    match reason {
        "MAX_TOKENS" => "max_tokens",
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => "refusal",
        _ => "end_turn",
    }
}
