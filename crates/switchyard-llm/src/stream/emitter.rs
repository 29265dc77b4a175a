use crate::protocol::anthropic::{MessageDeltaBody, StreamContentBlock, StreamDelta, StreamEvent, StreamMessage};
use crate::types::TokenUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Thinking,
    ToolUse,
}

/// Builds a well-formed canonical event sequence from loose upstream deltas
///
/// Opens `message_start` lazily, keeps at most one content block open and
/// guarantees a single `message_delta`/`message_stop` pair at the end.
#[derive(Debug)]
pub(super) struct EventEmitter {
    message_id: String,
    model: String,
    started: bool,
    finished: bool,
    next_index: u32,
    open: Option<(u32, BlockKind)>,
    stop_reason: Option<String>,
    saw_tool_use: bool,
}

impl EventEmitter {
    pub(super) fn new(model: &str) -> Self {
        Self {
            message_id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            model: model.to_owned(),
            started: false,
            finished: false,
            next_index: 0,
            open: None,
            stop_reason: None,
            saw_tool_use: false,
        }
    }

    /// Use the upstream's message id if the stream has not started yet
    pub(super) fn adopt_id(&mut self, id: Option<&str>) {
        if let Some(id) = id.filter(|id| !id.is_empty())
            && !self.started
        {
            self.message_id = id.to_owned();
        }
    }

    pub(super) fn start(&mut self, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        if self.started {
            return;
        }
        self.started = true;
        out.push(StreamEvent::MessageStart {
            message: StreamMessage::new(self.message_id.clone(), self.model.clone(), usage),
        });
    }

    pub(super) fn text(&mut self, text: &str, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }
        let index = self.ensure_block(BlockKind::Text, StreamContentBlock::Text { text: String::new() }, usage, out);
        out.push(StreamEvent::ContentBlockDelta {
            index,
            delta: StreamDelta::TextDelta { text: text.to_owned() },
        });
    }

    pub(super) fn thinking(&mut self, thinking: &str, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        if thinking.is_empty() {
            return;
        }
        let block = StreamContentBlock::Thinking {
            thinking: String::new(),
        };
        let index = self.ensure_block(BlockKind::Thinking, block, usage, out);
        out.push(StreamEvent::ContentBlockDelta {
            index,
            delta: StreamDelta::ThinkingDelta {
                thinking: thinking.to_owned(),
            },
        });
    }

    /// Open a new `tool_use` block, closing whatever was open
    pub(super) fn tool_start(&mut self, id: &str, name: &str, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        self.start(usage, out);
        self.close_block(out);

        let index = self.next_index;
        self.next_index += 1;
        self.open = Some((index, BlockKind::ToolUse));
        self.saw_tool_use = true;

        out.push(StreamEvent::ContentBlockStart {
            index,
            content_block: StreamContentBlock::ToolUse {
                id: id.to_owned(),
                name: name.to_owned(),
                input: serde_json::json!({}),
            },
        });
    }

    /// Append argument JSON to the open `tool_use` block, if any
    pub(super) fn tool_arguments(&mut self, partial_json: &str, out: &mut Vec<StreamEvent>) {
        let Some((index, BlockKind::ToolUse)) = self.open else {
            return;
        };
        if partial_json.is_empty() {
            return;
        }
        out.push(StreamEvent::ContentBlockDelta {
            index,
            delta: StreamDelta::InputJsonDelta {
                partial_json: partial_json.to_owned(),
            },
        });
    }

    /// Emit a complete `tool_use` block in one go
    pub(super) fn tool_use(
        &mut self,
        id: &str,
        name: &str,
        input: &serde_json::Value,
        usage: TokenUsage,
        out: &mut Vec<StreamEvent>,
    ) {
        self.tool_start(id, name, usage, out);
        self.tool_arguments(&input.to_string(), out);
        self.close_block(out);
    }

    pub(super) fn close_block(&mut self, out: &mut Vec<StreamEvent>) {
        if let Some((index, _)) = self.open.take() {
            out.push(StreamEvent::ContentBlockStop { index });
        }
    }

    pub(super) fn set_stop_reason(&mut self, reason: &str) {
        self.stop_reason = Some(reason.to_owned());
    }

    pub(super) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Close the message; later calls are no-ops
    pub(super) fn finish(&mut self, usage: TokenUsage, out: &mut Vec<StreamEvent>) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.start(usage, out);
        self.close_block(out);

        let mut stop_reason = self.stop_reason.take().unwrap_or_else(|| "end_turn".to_owned());
        if self.saw_tool_use && stop_reason == "end_turn" {
            stop_reason = "tool_use".to_owned();
        }
        out.push(StreamEvent::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason: Some(stop_reason),
                stop_sequence: None,
            },
            usage,
        });
        out.push(StreamEvent::MessageStop);
    }

    /// Index of the open block of `kind`, opening `content_block` if needed
    fn ensure_block(
        &mut self,
        kind: BlockKind,
        content_block: StreamContentBlock,
        usage: TokenUsage,
        out: &mut Vec<StreamEvent>,
    ) -> u32 {
        self.start(usage, out);

        if let Some((index, open)) = self.open
            && open == kind
        {
            return index;
        }

        self.close_block(out);
        let index = self.next_index;
        self.next_index += 1;
        self.open = Some((index, kind));
        out.push(StreamEvent::ContentBlockStart { index, content_block });
        index
    }
}
