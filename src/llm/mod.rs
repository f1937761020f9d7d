// Chat completion client
// Buffered and streamed calls against an OpenAI-compatible `/chat/completions` endpoint


pub mod stream;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::LlmConfig;
use crate::embeddings::Tokenizer;
use crate::embeddings::openai::build_agent;

pub use stream::{CompletionStream, StreamEvent, UsageEstimate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Parameters of a single completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// All message contents joined with newlines, used for usage estimates
    #[inline]
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Result of a buffered completion call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompletionClient {
    endpoint: Url,
    api_key: String,
    agent: ureq::Agent,
}

impl CompletionClient {
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint("chat/completions")
            .context("Failed to build completions URL from config")?;
        let api_key = config.resolve_api_key()?;

        Ok(Self {
            endpoint,
            api_key,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    /// Run a completion and wait for the whole answer
    #[inline]
    pub fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let mut response = self.send(request, false)?;
        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read completion response")?;

        let parsed: CompletionResponse =
            serde_json::from_str(&body).context("Failed to parse completion response")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("Completion response contained no choices")?;

        if let Some(usage) = parsed.usage {
            info!(
                "Token usage for {}: prompt {}, completion {}, total {}",
                request.model, usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: parsed.usage,
        })
    }

    /// Start a streamed completion.
    ///
    /// The returned iterator holds the open connection; dropping it ends the call.
    #[inline]
    pub fn stream(
        &self,
        request: &CompletionRequest,
        tokenizer: Option<&Tokenizer>,
    ) -> Result<CompletionStream<Box<dyn BufRead>>> {
        let response = self.send(request, true)?;
        let reader: Box<dyn BufRead> = Box::new(BufReader::new(response.into_body().into_reader()));

        let stream = CompletionStream::new(reader);
        Ok(match tokenizer {
            Some(tokenizer) => stream.with_usage_estimate(tokenizer.clone(), &request.prompt_text()),
            None => stream,
        })
    }

    fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        let body = RequestBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };
        let request_json =
            serde_json::to_string(&body).context("Failed to serialize completion request")?;

        debug!(
            "Requesting {} completion from {} ({} messages, max {} tokens)",
            if stream { "streamed" } else { "buffered" },
            request.model,
            request.messages.len(),
            request.max_tokens
        );

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send(&request_json)
            .with_context(|| format!("Completion request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.body_mut().read_to_string().unwrap_or_default();
            warn!("Completion endpoint returned {}: {}", status, detail);
            anyhow::bail!("Completion API error: HTTP {}: {}", status.as_u16(), detail);
        }

        Ok(response)
    }
}
