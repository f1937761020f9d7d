
use anyhow::Result;
use serde::Deserialize;
use std::fmt;
use std::io::{BufRead, Lines};
use std::iter::FusedIterator;
use tracing::{debug, info, warn};

use crate::embeddings::Tokenizer;

const DONE_MARKER: &str = "[DONE]";

/// One event of a streamed completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty piece of generated text
    Delta(String),
    /// End of generation; emitted exactly once
    Stop { finish_reason: Option<String> },
}

/// Token usage computed locally for a streamed completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageEstimate {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug)]
struct UsageCounter {
    tokenizer: Tokenizer,
    prompt_tokens: usize,
}

/// Lazy iterator over server-sent completion events.
///
/// Yields `Delta` events in arrival order and then a single `Stop`. A read
/// error is yielded once and ends the stream.
pub struct CompletionStream<R> {
    lines: Lines<R>,
    finished: bool,
    finish_reason: Option<String>,
    text: String,
    usage: Option<UsageCounter>,
    estimate: Option<UsageEstimate>,
}

impl<R> fmt::Debug for CompletionStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionStream")
            .field("finished", &self.finished)
            .field("text_len", &self.text.len())
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> CompletionStream<R> {
    #[inline]
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
            finish_reason: None,
            text: String::new(),
            usage: None,
            estimate: None,
        }
    }

    /// Estimate token usage with `tokenizer` once the stream stops
    #[inline]
    pub fn with_usage_estimate(mut self, tokenizer: Tokenizer, prompt: &str) -> Self {
        let prompt_tokens = tokenizer.count(prompt);
        self.usage = Some(UsageCounter {
            tokenizer,
            prompt_tokens,
        });
        self
    }

    /// Text received so far
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Available after the `Stop` event when an estimate was requested
    #[inline]
    pub fn usage_estimate(&self) -> Option<UsageEstimate> {
        self.estimate
    }

    fn stop(&mut self) -> StreamEvent {
        self.finished = true;

        if let Some(counter) = &self.usage {
            let completion_tokens = counter.tokenizer.count(&self.text);
            let estimate = UsageEstimate {
                prompt_tokens: counter.prompt_tokens,
                completion_tokens,
                total_tokens: counter.prompt_tokens + completion_tokens,
            };
            info!(
                "Estimated token usage: prompt {}, completion {}, total {}",
                estimate.prompt_tokens, estimate.completion_tokens, estimate.total_tokens
            );
            self.estimate = Some(estimate);
        }

        StreamEvent::Stop {
            finish_reason: self.finish_reason.take(),
        }
    }

    /// Parse one `data:` payload, returning generated text if it carries any
    fn parse_fragment(&mut self, data: &str) -> Option<String> {
        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Skipping malformed stream fragment: {}", e);
                return None;
            }
        };

        let choice = chunk.choices.into_iter().next()?;
        if choice.finish_reason.is_some() {
            self.finish_reason = choice.finish_reason;
        }

        choice.delta.content.filter(|content| !content.is_empty())
    }
}

impl<R: BufRead> Iterator for CompletionStream<R> {
    type Item = Result<StreamEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                None => {
                    debug!("Completion stream ended without a done marker");
                    return Some(Ok(self.stop()));
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(anyhow::Error::new(e).context("Completion stream interrupted")));
                }
                Some(Ok(line)) => line,
            };

            // Blank keep-alives, comments and `event:` lines carry no data
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == DONE_MARKER {
                return Some(Ok(self.stop()));
            }

            if let Some(content) = self.parse_fragment(data) {
                self.text.push_str(&content);
                return Some(Ok(StreamEvent::Delta(content)));
            }
        }
    }
}

impl<R: BufRead> FusedIterator for CompletionStream<R> {}
