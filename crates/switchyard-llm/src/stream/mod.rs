//! Re-framing of upstream response bodies into canonical SSE
//!
//! A [`StreamParser`] is bound to one [`StreamFormat`]. Canonical bodies are
//! forwarded line by line; other formats are translated into the canonical
//! event sequence. Usage is accumulated from every `data:` line and handed
//! to the caller exactly once.

mod emitter;
mod gemini;
mod line;
mod openai;
mod usage;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

pub use usage::extract_usage;

use self::gemini::GeminiTranslator;
use self::line::{LineBuffer, trim_terminator};
use self::openai::OpenAiTranslator;
use crate::adapter::Adapter;
use crate::protocol::anthropic::StreamEvent;
use crate::types::TokenUsage;

/// Wire format of an upstream streaming body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamFormat {
    /// Canonical Anthropic Messages SSE
    AnthropicSse,
    /// OpenAI Chat Completions SSE
    OpenAiSse,
    /// Gemini `streamGenerateContent?alt=sse`
    GeminiSse,
}

impl StreamFormat {
    pub const fn is_canonical(self) -> bool {
        matches!(self, Self::AnthropicSse)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AnthropicSse => "anthropic-sse",
            Self::OpenAiSse => "openai-sse",
            Self::GeminiSse => "gemini-sse",
        })
    }
}

/// Callback receiving the final usage of a stream
pub type UsageCallback = Box<dyn FnOnce(TokenUsage) + Send>;

#[derive(Debug)]
enum Translator {
    Passthrough,
    OpenAi(OpenAiTranslator),
    Gemini(GeminiTranslator),
}

/// Incremental parser for one upstream response body
pub struct StreamParser {
    format: StreamFormat,
    lines: LineBuffer,
    translator: Translator,
    usage: TokenUsage,
    on_usage: Option<UsageCallback>,
    closed: bool,
}

impl fmt::Debug for StreamParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamParser")
            .field("format", &self.format)
            .field("usage", &self.usage)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl StreamParser {
    /// Parser for `format`; `adapter` post-processes translated text
    pub fn new(format: StreamFormat, adapter: Adapter, model: &str) -> Self {
        let translator = match format {
            StreamFormat::AnthropicSse => Translator::Passthrough,
            StreamFormat::OpenAiSse => Translator::OpenAi(OpenAiTranslator::new(adapter, model)),
            StreamFormat::GeminiSse => Translator::Gemini(GeminiTranslator::new(adapter, model)),
        };

        Self {
            format,
            lines: LineBuffer::default(),
            translator,
            usage: TokenUsage::default(),
            on_usage: None,
            closed: false,
        }
    }

    /// Register the callback fired once with the final usage
    #[must_use]
    pub fn on_usage(mut self, callback: impl FnOnce(TokenUsage) + Send + 'static) -> Self {
        self.on_usage = Some(Box::new(callback));
        self
    }

    pub const fn format(&self) -> StreamFormat {
        self.format
    }

    /// Usage accumulated so far; never decreases
    pub const fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Consume one body chunk, returning canonical SSE bytes ready to send
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        if self.closed {
            return Vec::new();
        }
        let lines = self.lines.push(chunk);
        self.process(lines)
    }

    /// End of upstream body; flushes any partial line and terminates the stream
    ///
    /// Only the first call produces output or fires the usage callback.
    pub fn finish(&mut self) -> Vec<Bytes> {
        if self.closed {
            return Vec::new();
        }

        let mut frames = match self.lines.take_remainder() {
            Some(mut tail) => {
                tail.push(b'\n');
                self.process(vec![tail])
            }
            None => Vec::new(),
        };
        self.closed = true;

        let mut events = Vec::new();
        match &mut self.translator {
            Translator::Passthrough => {}
            Translator::OpenAi(t) => t.finish(self.usage, &mut events),
            Translator::Gemini(t) => t.finish(self.usage, &mut events),
        }
        frames.extend(encode(&events));

        self.fire_usage();
        frames
    }

    /// Drive `body` through the parser as a stream of canonical SSE frames
    ///
    /// Read errors and idle timeouts end the stream after the usual
    /// termination. Dropping the returned stream drops `body`.
    pub fn into_stream<S, E>(
        self,
        body: S,
        idle_timeout: Option<Duration>,
        provider: String,
    ) -> impl Stream<Item = Bytes> + Send + 'static
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let mut parser = self;
        async_stream::stream! {
            tokio::pin!(body);

            loop {
                let next = match idle_timeout {
                    Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            tracing::warn!(provider = %provider, timeout = ?limit, "upstream stream went idle");
                            break;
                        }
                    },
                    None => body.next().await,
                };

                match next {
                    Some(Ok(chunk)) => {
                        for frame in parser.feed(&chunk) {
                            yield frame;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(provider = %provider, error = %e, "upstream stream read failed");
                        break;
                    }
                    None => break,
                }
            }

            for frame in parser.finish() {
                yield frame;
            }
            tracing::debug!(provider = %provider, usage = ?parser.usage(), "stream finished");
        }
    }

    fn process(&mut self, lines: Vec<Vec<u8>>) -> Vec<Bytes> {
        let mut frames = Vec::new();
        let mut passthrough = Vec::new();
        let mut events = Vec::new();

        for raw in lines {
            let line = String::from_utf8_lossy(trim_terminator(&raw)).into_owned();
            let data = line.strip_prefix("data:").map(str::trim_start);

            if let Some(data) = data
                && let Ok(value) = serde_json::from_str::<serde_json::Value>(data)
                && let Some(observed) = extract_usage(&value)
            {
                self.usage.merge(observed);
            }

            match &mut self.translator {
                Translator::Passthrough => passthrough.extend_from_slice(&raw),
                Translator::OpenAi(t) => {
                    if let Some(data) = data {
                        t.on_data(data, self.usage, &mut events);
                    }
                }
                Translator::Gemini(t) => {
                    if let Some(data) = data {
                        t.on_data(data, self.usage, &mut events);
                    }
                }
            }
        }

        if !passthrough.is_empty() {
            frames.push(Bytes::from(passthrough));
        }
        frames.extend(encode(&events));
        frames
    }

    fn fire_usage(&mut self) {
        if let Some(callback) = self.on_usage.take() {
            callback(self.usage);
        }
    }
}

impl Drop for StreamParser {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!(format = %self.format, "stream dropped before completion");
        }
        self.fire_usage();
    }
}

fn encode(events: &[StreamEvent]) -> impl Iterator<Item = Bytes> + '_ {
    events.iter().map(|event| Bytes::from(event.to_sse()))
}
