
use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::chat::Conversation;
use crate::config::Config;
use crate::database::lancedb::vector_store::DEFAULT_CONTENT_LIMIT;
use crate::database::{Database, Document, NewDocument, VectorStore};
use crate::llm::StreamEvent;
use crate::pipeline::{Answer, AnswerOptions, DocumentPipeline, UploadResult};

/// Which documents a question is grounded in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSelection {
    pub files: Vec<PathBuf>,
    pub all: bool,
}

impl DocumentSelection {
    /// Neither files nor `--all` were given
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && !self.all
    }
}

const NO_DOCUMENTS_SELECTED: &str =
    "No documents selected, answering without them. Pass --file or --all to ask about uploads.";

/// Upload files into the vector store and record them in the registry
#[inline]
pub async fn upload_files(paths: &[PathBuf]) -> Result<()> {
    let config = Config::load()?;
    let pipeline = DocumentPipeline::new(&config).await?;
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to initialize database")?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Uploading {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_length(paths.len() as u64);

    let mut failures = 0_usize;
    for path in paths {
        bar.set_message(path.display().to_string());
        bar.tick();

        let outcome = pipeline.ingest(path).await;
        let result = UploadResult::from_ingest(path, &outcome);

        if let Ok(report) = &outcome {
            let document = NewDocument {
                fingerprint: report.intake.fingerprint.clone(),
                file_name: report.intake.file_name.clone(),
                file_path: report.intake.file_path.display().to_string(),
                extension: report.intake.extension.clone(),
                point_count: i64::try_from(report.points).unwrap_or(i64::MAX),
            };
            if let Err(e) = database.record_upload(&document).await {
                warn!("Failed to record {} in the registry: {:#}", document.file_name, e);
            }
        }
        if !result.is_success() {
            failures += 1;
        }

        bar.suspend(|| println!("{}", serde_json::to_string(&result).unwrap_or_default()));
        bar.inc(1);
    }
    bar.finish_and_clear();

    if failures > 0 {
        eprintln!(
            "{}",
            style(format!("⚠ {} of {} uploads failed", failures, paths.len())).yellow()
        );
    }

    Ok(())
}

/// List uploaded documents
#[inline]
pub async fn list_documents() -> Result<()> {
    let config = Config::load()?;
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to initialize database")?;

    let documents = database.list_documents().await?;
    if documents.is_empty() {
        println!("No documents uploaded yet.");
        println!("Use 'docqa upload <file>' to add one.");
        return Ok(());
    }

    println!("📚 Uploaded Documents");
    println!();
    for document in &documents {
        println!(
            "  {} {} ({} chunks, uploaded {})",
            style(document.short_fingerprint()).dim(),
            style(&document.file_name).bold(),
            document.point_count,
            document.created_date.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!("Total: {} documents", documents.len());

    Ok(())
}

/// A registry entry together with its stored text
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentContent {
    pub document: Document,
    /// Points in the collection, `None` when the collection is missing
    pub points: Option<u64>,
    pub text: String,
    /// True when the collection holds more points than were read
    pub truncated: bool,
}

/// Look a document up and read at most `limit` of its chunks; needs no API access
#[inline]
pub async fn load_document(
    config: &Config,
    identifier: &str,
    limit: usize,
) -> Result<Option<DocumentContent>> {
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to initialize database")?;
    let Some(document) = database.find_document(identifier).await? else {
        return Ok(None);
    };

    let store = VectorStore::new(config).await?;
    let collection = document.collection_name().to_string();
    if !store.collection_exists(&collection).await? {
        return Ok(Some(DocumentContent {
            document,
            points: None,
            text: String::new(),
            truncated: false,
        }));
    }

    let points = store.point_count(&collection).await?;
    let text = store.collection_content(&collection, limit).await?;

    Ok(Some(DocumentContent {
        document,
        points: Some(points),
        text,
        truncated: points > limit as u64,
    }))
}

/// Drop a document's collection and registry entry; returns the removed name
#[inline]
pub async fn remove_document(config: &Config, identifier: &str) -> Result<Option<String>> {
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to initialize database")?;
    let store = VectorStore::new(config).await?;

    let (fingerprint, name) = match database.find_document(identifier).await? {
        Some(document) => (document.fingerprint, document.file_name),
        None => (identifier.to_string(), identifier.to_string()),
    };

    let dropped = store.delete_collection(&fingerprint).await?;
    let removed = database.delete_document(&fingerprint).await?;

    if dropped || removed {
        info!("Deleted document {} ({})", name, fingerprint);
        Ok(Some(name))
    } else {
        Ok(None)
    }
}

/// Show a document's registry entry and the start of its stored text
#[inline]
pub async fn show_document(identifier: &str) -> Result<()> {
    let config = Config::load()?;

    let Some(content) = load_document(&config, identifier, DEFAULT_CONTENT_LIMIT).await? else {
        println!("Document not found: {}", identifier);
        return Ok(());
    };
    let document = &content.document;

    println!("📄 {}", style(&document.file_name).bold().cyan());
    println!("  Fingerprint: {}", document.fingerprint);
    println!("  Path: {}", document.file_path);
    println!("  Type: {}", document.extension);
    println!("  Uploaded: {}", document.created_date.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated: {}", document.updated_date.format("%Y-%m-%d %H:%M:%S"));

    let Some(points) = content.points else {
        println!("  Chunks: {}", style("missing from vector store").red());
        return Ok(());
    };
    println!("  Chunks: {}", points);

    println!();
    println!("{}", content.text);
    if content.truncated {
        println!();
        println!(
            "{}",
            style(format!(
                "… truncated: showing the first {} of {} chunks",
                DEFAULT_CONTENT_LIMIT, points
            ))
            .dim()
        );
    }

    Ok(())
}

/// Delete a document's collection and registry entry
#[inline]
pub async fn delete_document(identifier: &str) -> Result<()> {
    let config = Config::load()?;

    match remove_document(&config, identifier).await? {
        Some(name) => println!("Deleted document: {}", name),
        None => println!("Document not found: {}", identifier),
    }

    Ok(())
}

/// Answer one question and print it
#[inline]
pub async fn ask(
    question: &str,
    selection: &DocumentSelection,
    top_n: Option<usize>,
    options: &AnswerOptions,
) -> Result<()> {
    let config = Config::load()?;
    let pipeline = DocumentPipeline::new(&config).await?;
    let collections = resolve_collections(&config, selection).await?;
    let top_n = top_n.unwrap_or_else(|| pipeline.default_top_n());

    let mut conversation = Conversation::new();
    conversation.push_user(question);

    let messages = pipeline
        .messages(&collections, &conversation, top_n)
        .await?;
    let request = pipeline.completion_request(messages, options)?;
    let answer = pipeline.answer(&request, options.stream)?;
    print_answer(answer)?;

    Ok(())
}

/// Interactive multi-turn session; an empty line or `exit` ends it
#[inline]
pub async fn chat(
    selection: &DocumentSelection,
    plain: bool,
    top_n: Option<usize>,
    options: &AnswerOptions,
) -> Result<()> {
    let config = Config::load()?;
    let pipeline = DocumentPipeline::new(&config).await?;
    let collections = if plain {
        Vec::new()
    } else {
        resolve_collections(&config, selection).await?
    };
    let top_n = top_n.unwrap_or_else(|| pipeline.default_top_n());

    if collections.is_empty() {
        eprintln!("{}", style("💬 Chatting without documents").bold().cyan());
    } else {
        eprintln!(
            "{}",
            style(format!("💬 Chatting with {} documents", collections.len()))
                .bold()
                .cyan()
        );
    }
    eprintln!("Type 'exit' or an empty line to quit.");

    let mut conversation = Conversation::new();
    loop {
        let question: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();
        if question.is_empty() || question == "exit" || question == "quit" {
            break;
        }

        conversation.push_user(question);
        match answer_turn(&pipeline, &collections, &conversation, top_n, options).await {
            Ok(text) => conversation.answer_last(text),
            Err(e) => {
                warn!("Question failed: {:#}", e);
                eprintln!("{}", style(format!("⚠ {:#}", e)).yellow());
                conversation.discard_last();
            }
        }
    }

    Ok(())
}

async fn answer_turn(
    pipeline: &DocumentPipeline,
    collections: &[String],
    conversation: &Conversation,
    top_n: usize,
    options: &AnswerOptions,
) -> Result<String> {
    let messages = pipeline
        .messages(collections, conversation, top_n)
        .await?;
    let request = pipeline.completion_request(messages, options)?;
    let answer = pipeline.answer(&request, options.stream)?;
    print_answer(answer)
}

async fn resolve_collections(config: &Config, selection: &DocumentSelection) -> Result<Vec<String>> {
    if selection.is_empty() {
        warn!("{}", NO_DOCUMENTS_SELECTED);
        eprintln!("{}", style(format!("⚠ {}", NO_DOCUMENTS_SELECTED)).yellow());
        return Ok(Vec::new());
    }

    if selection.all {
        let database = Database::initialize_from_config_dir(config.get_base_dir())
            .await
            .context("Failed to initialize database")?;
        let documents = database.list_documents().await?;
        anyhow::ensure!(!documents.is_empty(), "No documents uploaded yet");
        info!(
            "Using all documents: {}",
            documents.iter().map(|d| d.file_name.as_str()).join(", ")
        );
        return Ok(documents.into_iter().map(|d| d.fingerprint).collect());
    }

    Ok(DocumentPipeline::collections_for(&selection.files)?)
}

/// Print an answer to stdout as it arrives; returns the full text
fn print_answer(answer: Answer) -> Result<String> {
    let mut stdout = std::io::stdout();

    match answer {
        Answer::Buffered(completion) => {
            writeln!(stdout, "{}", completion.content)?;
            if completion.finish_reason.as_deref() == Some("length") {
                eprintln!("{}", style("⚠ Answer truncated at max tokens").yellow());
            }
            if let Some(usage) = completion.usage {
                info!(
                    "Tokens: {} prompt + {} completion = {}",
                    usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                );
            }
            Ok(completion.content)
        }
        Answer::Streamed(mut stream) => {
            for event in stream.by_ref() {
                match event {
                    Ok(StreamEvent::Delta(text)) => {
                        write!(stdout, "{}", text)?;
                        stdout.flush()?;
                    }
                    Ok(StreamEvent::Stop { finish_reason }) => {
                        if finish_reason.as_deref() == Some("length") {
                            eprintln!();
                            eprintln!("{}", style("⚠ Answer truncated at max tokens").yellow());
                        }
                    }
                    Err(e) => {
                        warn!("Answer stream interrupted: {:#}", e);
                        eprintln!();
                        eprintln!("{}", style("⚠ Answer stream interrupted").yellow());
                    }
                }
            }
            writeln!(stdout)?;
            Ok(stream.text().to_string())
        }
    }
}
