// Document QA pipeline
// Upload: intake -> extract -> chunk -> embed -> store. Ask: embed -> retrieve -> prompt -> complete.

#[cfg(test)]
mod tests;

use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::chat::{
    Conversation, RetrievedContext, build_context, build_document_prompt, document_messages,
    plain_chat_messages, render_history,
};
use crate::config::{ChatConfig, Config};
use crate::database::{CollectionStatus, Payload, VectorStore};
use crate::embeddings::{Chunker, EmbeddingClient, Tokenizer};
use crate::ingest::{FileIntake, extract_segments, fingerprint_file};
use crate::llm::{ChatMessage, Completion, CompletionClient, CompletionRequest, CompletionStream};
use crate::retry::RetryPolicy;
use crate::DocQaError;

pub const CODE_OK: u16 = 200;
pub const CODE_BAD_REQUEST: u16 = 400;
pub const CODE_SERVER_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadData {
    pub uploaded_file_path: String,
}

/// Status of one upload, serialized as `{ code, msg, data }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub code: u16,
    pub msg: Option<String>,
    pub data: Option<UploadData>,
}

impl UploadResult {
    #[inline]
    pub fn success(path: &Path) -> Self {
        Self {
            code: CODE_OK,
            msg: None,
            data: Some(UploadData {
                uploaded_file_path: path.display().to_string(),
            }),
        }
    }

    #[inline]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_BAD_REQUEST,
            msg: Some(msg.into()),
            data: None,
        }
    }

    #[inline]
    pub fn server_error(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_SERVER_ERROR,
            msg: Some(msg.into()),
            data: None,
        }
    }

    /// Map an ingestion outcome: rejected input is a 400, anything else failing a 500
    #[inline]
    pub fn from_ingest(path: &Path, outcome: &Result<IngestReport, DocQaError>) -> Self {
        match outcome {
            Ok(report) => {
                info!(
                    "Upload of {} succeeded ({} points, reused: {})",
                    report.intake.file_name, report.points, report.reused
                );
                Self::success(path)
            }
            Err(DocQaError::Validation(msg)) => {
                warn!("Rejected upload {}: {}", path.display(), msg);
                Self::bad_request(msg.clone())
            }
            Err(e) => {
                error!("Upload of {} failed: {}", path.display(), e);
                Self::server_error(e.to_string())
            }
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.code == CODE_OK
    }
}

/// What happened to one ingested file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub intake: FileIntake,
    /// Points in the collection after ingestion
    pub points: u64,
    /// True when the collection was already populated and nothing was embedded
    pub reused: bool,
}

/// Per-call overrides of the configured chat defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stream: Option<bool>,
}

/// Answer from the completion endpoint
#[derive(Debug)]
pub enum Answer {
    Buffered(Completion),
    Streamed(CompletionStream<Box<dyn BufRead>>),
}

pub struct DocumentPipeline {
    chunker: Chunker,
    embedder: EmbeddingClient,
    completions: CompletionClient,
    store: VectorStore,
    retry: RetryPolicy,
    chat: ChatConfig,
    top_n: usize,
}

impl DocumentPipeline {
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, DocQaError> {
        let chunker = Chunker::new(&config.chunking)
            .map_err(|e| DocQaError::Config(format!("Invalid chunking settings: {}", e)))?;
        let embedder = EmbeddingClient::new(&config.llm)
            .map_err(|e| DocQaError::Config(format!("{:#}", e)))?;
        let completions = CompletionClient::new(&config.llm)
            .map_err(|e| DocQaError::Config(format!("{:#}", e)))?;
        let store = VectorStore::new(config).await?;

        Ok(Self {
            chunker,
            embedder,
            completions,
            store,
            retry: config.retry,
            chat: config.chat.clone(),
            top_n: config.retrieval.top_n,
        })
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn tokenizer(&self) -> &Tokenizer {
        self.chunker.tokenizer()
    }

    #[inline]
    pub fn default_top_n(&self) -> usize {
        self.top_n
    }

    /// Ingest a file and report the outcome as an upload result; never fails
    #[inline]
    pub async fn upload(&self, path: &Path) -> UploadResult {
        let outcome = self.ingest(path).await;
        UploadResult::from_ingest(path, &outcome)
    }

    /// Store the file's chunks under its fingerprint unless already present
    #[inline]
    pub async fn ingest(&self, path: &Path) -> Result<IngestReport, DocQaError> {
        let intake =
            FileIntake::open(path).map_err(|e| DocQaError::Validation(e.to_string()))?;
        let collection = intake.collection_name().to_string();

        match self.store.get_or_create(&collection).await? {
            CollectionStatus::Populated { points } => {
                info!(
                    "Collection {} already holds {} points, reusing it for {}",
                    collection, points, intake.file_name
                );
                return Ok(IngestReport {
                    intake,
                    points,
                    reused: true,
                });
            }
            CollectionStatus::Empty { created } => {
                debug!("Collection {} is empty (created: {})", collection, created);
            }
        }

        let segments = extract_segments(&intake.file_path, &intake.file_name, &intake.extension)
            .map_err(|e| DocQaError::Extraction(format!("{:#}", e)))?;
        let chunks = self.chunker.chunk_segments(&segments);
        if chunks.is_empty() {
            return Err(DocQaError::Extraction(format!(
                "No extractable text in {}",
                intake.file_name
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embed_with_retry(texts).await?;

        let payloads: Vec<Payload> = chunks
            .into_iter()
            .map(|chunk| Payload {
                page_content: chunk.text,
                metadata: chunk.metadata,
            })
            .collect();

        let written = self.store.upsert(&collection, &vectors, &payloads).await?;

        Ok(IngestReport {
            intake,
            points: written as u64,
            reused: false,
        })
    }

    /// Collection names (content fingerprints) of `files`
    #[inline]
    pub fn collections_for(files: &[PathBuf]) -> Result<Vec<String>, DocQaError> {
        files
            .iter()
            .map(|path| {
                fingerprint_file(path).map_err(|e| {
                    DocQaError::Validation(format!("Failed to read {}: {}", path.display(), e))
                })
            })
            .collect()
    }

    /// Retrieve the best chunks for `question` across `collections`
    #[inline]
    pub async fn retrieve(
        &self,
        collections: &[String],
        question: &str,
        top_n: usize,
    ) -> Result<RetrievedContext, DocQaError> {
        debug!("Collections for retrieval: {:?}", collections);

        let mut vectors = self.embed_with_retry(vec![question.to_string()]).await?;
        let query_vector = vectors
            .pop()
            .ok_or_else(|| DocQaError::Embedding("No vector returned for question".to_string()))?;

        build_context(&self.store, collections, &query_vector, top_n).await
    }

    /// Prompt for the conversation's in-flight question, grounded in the files
    #[inline]
    pub async fn document_prompt(
        &self,
        files: &[PathBuf],
        conversation: &Conversation,
        top_n: usize,
    ) -> Result<String, DocQaError> {
        if files.is_empty() {
            return Err(DocQaError::Validation("No files selected".to_string()));
        }
        let collections = Self::collections_for(files)?;
        self.collection_prompt(&collections, conversation, top_n)
            .await
    }

    /// Prompt for the in-flight question, grounded in already-known collections
    #[inline]
    pub async fn collection_prompt(
        &self,
        collections: &[String],
        conversation: &Conversation,
        top_n: usize,
    ) -> Result<String, DocQaError> {
        let (question, context) = self
            .conversation_context(collections, conversation, top_n)
            .await?;
        let history = render_history(conversation.prior_turns());
        let prompt = build_document_prompt(&context.text, &history, question);
        debug!("Prompt: {}", prompt);

        Ok(prompt)
    }

    /// Messages for the in-flight question; plain chat when no collections are given
    #[inline]
    pub async fn messages(
        &self,
        collections: &[String],
        conversation: &Conversation,
        top_n: usize,
    ) -> Result<Vec<ChatMessage>, DocQaError> {
        if collections.is_empty() {
            return Ok(plain_chat_messages(conversation));
        }
        let (_, context) = self
            .conversation_context(collections, conversation, top_n)
            .await?;
        Ok(document_messages(&context.text, conversation))
    }

    async fn conversation_context<'c>(
        &self,
        collections: &[String],
        conversation: &'c Conversation,
        top_n: usize,
    ) -> Result<(&'c str, RetrievedContext), DocQaError> {
        if collections.is_empty() {
            return Err(DocQaError::Validation("No documents selected".to_string()));
        }
        let question = conversation
            .in_flight()
            .map(|turn| turn.user.as_str())
            .filter(|question| !question.trim().is_empty())
            .ok_or_else(|| DocQaError::Validation("Question is empty".to_string()))?;

        let context = self.retrieve(collections, question, top_n).await?;
        Ok((question, context))
    }

    /// Resolve per-call options against the configured defaults and model limits
    #[inline]
    pub fn completion_request(
        &self,
        messages: Vec<ChatMessage>,
        options: &AnswerOptions,
    ) -> Result<CompletionRequest, DocQaError> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.chat.default_model.clone());
        let requested = options.max_tokens.unwrap_or(self.chat.default_max_tokens);
        let max_tokens = self
            .chat
            .clamp_max_tokens(&model, requested)
            .map_err(|e| DocQaError::Validation(e.to_string()))?;
        if max_tokens != requested {
            warn!(
                "max_tokens {} exceeds the limit of {}, using {}",
                requested, model, max_tokens
            );
        }

        Ok(CompletionRequest {
            model,
            messages,
            temperature: options.temperature.unwrap_or(self.chat.temperature),
            max_tokens,
        })
    }

    /// Run the completion, buffered or streamed
    #[inline]
    pub fn answer(
        &self,
        request: &CompletionRequest,
        stream: Option<bool>,
    ) -> Result<Answer, DocQaError> {
        if stream.unwrap_or(self.chat.stream) {
            let stream = self
                .retry
                .run("completion stream", || {
                    self.completions.stream(request, Some(self.tokenizer()))
                })
                .map_err(|e| DocQaError::Completion(format!("{:#}", e)))?;
            Ok(Answer::Streamed(stream))
        } else {
            let completion = self
                .retry
                .run("completion", || self.completions.complete(request))
                .map_err(|e| DocQaError::Completion(format!("{:#}", e)))?;
            Ok(Answer::Buffered(completion))
        }
    }

    async fn embed_with_retry(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, DocQaError> {
        let embedder = self.embedder.clone();
        let retry = self.retry;

        tokio::task::spawn_blocking(move || retry.run("embedding", || embedder.embed(&texts)))
            .await
            .map_err(|e| DocQaError::Other(anyhow::anyhow!("Embedding task failed: {}", e)))?
            .map_err(|e| DocQaError::Embedding(format!("{:#}", e)))
    }
}
