use clap::{Args, Parser, Subcommand};
use docqa::commands::{
    DocumentSelection, ask, chat, delete_document, list_documents, show_document, upload_files,
};
use docqa::config::{run_interactive_config, show_config};
use docqa::pipeline::AnswerOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about your PDF and text documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the API endpoint, models and defaults
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Upload .pdf or .txt files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List uploaded documents
    List,
    /// Show a document's details and stored text
    Show {
        /// Fingerprint or file name
        document: String,
    },
    /// Delete an uploaded document
    Delete {
        /// Fingerprint or file name
        document: String,
    },
    /// Ask a single question
    Ask {
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        answer: AnswerArgs,
        /// The question to ask
        question: String,
    },
    /// Start an interactive chat session
    Chat {
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        answer: AnswerArgs,
        /// Chat without any documents
        #[arg(long, conflicts_with_all = ["file", "all"])]
        plain: bool,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Document file to answer from; repeat for several
    #[arg(long = "file", short = 'f')]
    file: Vec<PathBuf>,
    /// Answer from every uploaded document
    #[arg(long, conflicts_with = "file")]
    all: bool,
}

#[derive(Args)]
struct AnswerArgs {
    /// Number of chunks to retrieve as context
    #[arg(long)]
    top_n: Option<usize>,
    /// Chat model to use
    #[arg(long)]
    model: Option<String>,
    /// Maximum tokens in the answer
    #[arg(long)]
    max_tokens: Option<u32>,
    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,
    /// Wait for the whole answer instead of streaming it
    #[arg(long)]
    no_stream: bool,
}

impl From<SelectionArgs> for DocumentSelection {
    fn from(args: SelectionArgs) -> Self {
        Self {
            files: args.file,
            all: args.all,
        }
    }
}

impl AnswerArgs {
    fn options(&self) -> AnswerOptions {
        AnswerOptions {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: self.no_stream.then_some(false),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Upload { files } => {
            upload_files(&files).await?;
        }
        Commands::List => {
            list_documents().await?;
        }
        Commands::Show { document } => {
            show_document(&document).await?;
        }
        Commands::Delete { document } => {
            delete_document(&document).await?;
        }
        Commands::Ask {
            selection,
            answer,
            question,
        } => {
            ask(
                &question,
                &selection.into(),
                answer.top_n,
                &answer.options(),
            )
            .await?;
        }
        Commands::Chat {
            selection,
            answer,
            plain,
        } => {
            chat(&selection.into(), plain, answer.top_n, &answer.options()).await?;
        }
    }

    Ok(())
}
