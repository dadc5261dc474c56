//! # Uni-Advisor — Admissions Advisor CLI
//!
//! Retrieval-augmented admissions chatbot: ingest PDF/CSV/web documents
//! into Qdrant collections and answer questions grounded in the active
//! collection.
//!
//! Usage:
//!   advisor ingest pdf tuyensinh.pdf --collection tuyensinh-2026
//!   advisor collections activate tuyensinh-2026
//!   advisor ask "Học phí ngành CNTT là bao nhiêu?"

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use advisor_chat::AdvisorContext;
use advisor_core::config::AdvisorConfig;
use advisor_ingest::loader::DocumentSource;
use advisor_ingest::{IngestOptions, IngestReport};

#[derive(Parser)]
#[command(name = "advisor", version, about = "🎓 Uni-Advisor — Admissions Advisor CLI")]
struct Cli {
    /// Config file (default: ~/.uni-advisor/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a document into a collection
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },
    /// Ask a question against the active collection
    Ask {
        /// The question, verbatim
        question: String,
    },
    /// Manage vector-store collections
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },
    /// Show recent usage-log entries
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Args)]
struct IngestArgs {
    /// Target collection name
    #[arg(short, long)]
    collection: String,

    /// Destroy and recreate the collection before uploading
    #[arg(long)]
    force_recreate: bool,

    /// Fail if the collection already exists
    #[arg(long)]
    new: bool,
}

#[derive(Subcommand)]
enum IngestSource {
    /// Ingest a PDF file, one unit per page
    Pdf {
        path: PathBuf,
        #[command(flatten)]
        args: IngestArgs,
    },
    /// Ingest a CSV file, one unit per row
    Csv {
        path: PathBuf,
        #[command(flatten)]
        args: IngestArgs,
    },
    /// Ingest a web page
    Web {
        url: String,
        #[command(flatten)]
        args: IngestArgs,
    },
}

#[derive(Subcommand)]
enum CollectionsAction {
    /// List collections with vector size and point count
    List,
    /// Delete a collection
    Delete { name: String },
    /// Point the chatbot at a collection
    Activate { name: String },
    /// Show the active collection
    ShowActive,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "advisor=debug,uni_advisor=debug" } else { "advisor=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => AdvisorConfig::load_from(path)?,
        None => AdvisorConfig::load()?,
    };
    let ctx = AdvisorContext::initialize(config)?;

    match cli.command {
        Command::Ingest { source } => run_ingest(&ctx, source).await?,
        Command::Ask { question } => run_ask(&ctx, &question).await?,
        Command::Collections { action } => run_collections(&ctx, action).await?,
        Command::History { limit } => run_history(&ctx, limit).await?,
    }

    Ok(())
}

async fn run_ingest(ctx: &AdvisorContext, source: IngestSource) -> Result<()> {
    let (source, args) = match source {
        IngestSource::Pdf { path, args } => (DocumentSource::Pdf(path), args),
        IngestSource::Csv { path, args } => (DocumentSource::Csv(path), args),
        IngestSource::Web { url, args } => (DocumentSource::Web(url::Url::parse(&url)?), args),
    };
    let options =
        IngestOptions { force_recreate: args.force_recreate, expect_new: args.new };

    println!("📥 Ingesting {} into '{}'...", source.id(), args.collection);
    let embedder = ctx.embedder()?;
    let report: IngestReport = ctx
        .ingestor
        .ingest(&source, &args.collection, ctx.store.as_ref(), embedder.as_ref(), &options)
        .await?;
    println!(
        "✅ {} chunks uploaded to '{}' in {:.2}s",
        report.chunk_count, report.collection, report.elapsed_seconds
    );
    Ok(())
}

async fn run_ask(ctx: &AdvisorContext, question: &str) -> Result<()> {
    let actor = AdvisorContext::actor_identity();
    let outcome = ctx.orchestrator()?.answer(question, &actor).await;
    println!("{}", outcome.answer);
    if outcome.elapsed_seconds > 0.0 {
        println!("\n⏱️  Xử lý hoàn tất trong {:.2} giây", outcome.elapsed_seconds);
    }
    Ok(())
}

async fn run_collections(ctx: &AdvisorContext, action: CollectionsAction) -> Result<()> {
    match action {
        CollectionsAction::List => {
            let collections = ctx.store.list_collections().await?;
            if collections.is_empty() {
                println!("No collections.");
                return Ok(());
            }
            let active = ctx.chat_store.get_active().await?;
            for c in collections {
                let marker = if active.as_deref() == Some(c.name.as_str()) { "→" } else { " " };
                println!(
                    "{marker} {}  (dim {}, {} points, {})",
                    c.name, c.vector_size, c.point_count, c.distance_metric
                );
            }
        }
        CollectionsAction::Delete { name } => {
            if ctx.store.delete_collection(&name).await {
                println!("✅ Deleted '{name}'");
            } else {
                println!("❌ Could not confirm deletion of '{name}'");
            }
        }
        CollectionsAction::Activate { name } => {
            ctx.require_collection(&name).await?;
            ctx.chat_store.set_active(&name).await?;
            println!("✅ Active collection is now '{name}'");
        }
        CollectionsAction::ShowActive => match ctx.chat_store.get_active().await? {
            Some(name) => println!("Active collection: {name}"),
            None => println!("No active collection (chatbot answers in maintenance mode)."),
        },
    }
    Ok(())
}

async fn run_history(ctx: &AdvisorContext, limit: usize) -> Result<()> {
    let records = ctx.chat_store.recent(limit).await?;
    let total = ctx.chat_store.count().await?;
    println!("Usage log: {total} total, showing {}\n", records.len());
    for r in records {
        println!(
            "[{}] {} ({:.2}s, {}→{} words)",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.actor_identity,
            r.processing_time_seconds,
            r.input_word_count,
            r.output_word_count
        );
        println!("  Q: {}", r.question);
        println!("  A: {}\n", truncate(&r.answer, 200));
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
