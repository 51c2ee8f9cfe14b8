use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use openbook_domain::EngineConfig;
use openbook_engine::{OpenAiCompletion, OpenAiEmbedder, QaPipeline};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Message shown to the questioner when a single question fails; the
/// pipeline itself stays up.
const APOLOGY: &str = "Sorry, something went wrong while answering. Please try again.";

#[derive(Parser)]
#[command(name = "openbook")]
#[command(about = "Answers questions about an operations manual from a local document corpus")]
struct Cli {
    /// Directory holding the corpus files (.txt, .md, .pdf, .docx)
    #[arg(long, default_value = "docs")]
    corpus: PathBuf,

    /// Chunk window size in characters
    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,

    /// Passages retrieved per question
    #[arg(long, default_value_t = 4)]
    top_k: usize,

    /// Drop passages scoring below this similarity before composing
    #[arg(long)]
    min_similarity: Option<f32>,

    /// Embedding model name
    #[arg(long, default_value = "text-embedding-3-small")]
    embed_model: String,

    /// Chat completion model name
    #[arg(long, default_value = "gpt-4o")]
    chat_model: String,

    /// Per-request timeout for provider calls, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer with its sources
    Ask { question: String },
    /// Answer questions from stdin, one per line
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openbook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = EngineConfig::default()
        .corpus_dir(cli.corpus)
        .chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .top_k(cli.top_k)
        .request_timeout(Duration::from_secs(cli.timeout_secs));
    let config = match cli.min_similarity {
        Some(floor) => config.min_similarity(floor),
        None => config,
    };

    let embedder = Arc::new(OpenAiEmbedder::new(cli.embed_model));
    let completion = Arc::new(OpenAiCompletion::new(cli.chat_model));

    tracing::info!(corpus = %config.corpus_dir.display(), "building index");
    // A build failure is fatal: no partial service.
    let pipeline = QaPipeline::bootstrap(config, embedder, completion).await?;
    tracing::info!("ready");

    match cli.command {
        Commands::Ask { question } => {
            match pipeline.answer_question(&question, "cli").await {
                Ok(answer) => print_answer(&answer),
                Err(error) => {
                    tracing::error!(%error, "question failed");
                    println!("{APOLOGY}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Chat => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut lines = stdin.lines();
            let mut stdout = tokio::io::stdout();

            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            while let Some(line) = lines.next_line().await? {
                if !line.trim().is_empty() {
                    // A failed question leaves the pipeline serving.
                    match pipeline.answer_question(&line, "chat").await {
                        Ok(answer) => print_answer(&answer),
                        Err(error) => {
                            tracing::error!(%error, "question failed");
                            println!("{APOLOGY}");
                        }
                    }
                }
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;
            }
        }
    }

    Ok(())
}

fn print_answer(answer: &openbook_domain::Answer) {
    println!("{}", answer.text);
    if !answer.source_passages.is_empty() {
        println!("\nSources:");
        for chunk in &answer.source_passages {
            println!("  [{} @ {}]", chunk.source_id, chunk.offset);
        }
    }
}
