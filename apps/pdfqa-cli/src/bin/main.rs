//! `pdfqa`: ingest extracted PDF text and ask cited questions over it.
//!
//! ```bash
//! pdfqa ingest ./extracted/
//! pdfqa ask "How do plants store energy?" -k 3
//! pdfqa search "photosynthesis" --json
//! pdfqa list
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use pdfqa_cli::{loader, output};
use pdfqa_core::config::Config;
use pdfqa_core::error::Error;
use pdfqa_core::logging::init_tracing;
use pdfqa_core::types::QueryOptions;
use pdfqa_hybrid::QaEngine;

#[derive(Parser)]
#[command(name = "pdfqa", version, about = "Question answering over PDF documents with hybrid retrieval")]
struct Cli {
    /// Directory holding config.toml / config.<env>.toml (default: current directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index extracted documents (.txt pages split by form feed, or .json)
    Ingest { #[arg(required = true)] paths: Vec<PathBuf> },
    /// Answer a question with citations
    Ask {
        question: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Show the fused ranking without generating an answer
    Search {
        query: String,
        #[command(flatten)]
        options: QueryArgs,
    },
    /// Remove a document and everything indexed for it
    Delete { id: String },
    /// List indexed documents
    List {
        #[arg(long)]
        json: bool,
    },
    /// Summarize one document
    Summarize { id: String },
    /// Show index statistics
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Number of passages to retrieve
    #[arg(short = 'k', long)]
    k: Option<usize>,
    #[arg(long)]
    dense_weight: Option<f32>,
    #[arg(long)]
    sparse_weight: Option<f32>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl QueryArgs {
    fn resolve(&self, defaults: QueryOptions) -> QueryOptions {
        QueryOptions {
            k: self.k.unwrap_or(defaults.k),
            dense_weight: self.dense_weight.unwrap_or(defaults.dense_weight),
            sparse_weight: self.sparse_weight.unwrap_or(defaults.sparse_weight),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config_dir {
        Some(dir) => {
            let env_name = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
            Config::load_from(dir, &env_name)?
        }
        None => Config::load()?,
    };
    let engine = QaEngine::from_config(&config).context("starting engine")?;

    match cli.command {
        Command::Ingest { paths } => ingest(&engine, &paths).await?,
        Command::Ask { question, query } => {
            let answer = match engine.ask(&question, query.resolve(engine.default_options())).await {
                Ok(answer) => answer,
                Err(Error::Generation { source, sources }) => {
                    if query.json {
                        println!("{}", serde_json::to_string_pretty(&output::failed_answer_json(&source, &sources))?);
                    } else {
                        eprint!("{}", output::format_failed_answer(&source, &sources));
                    }
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            };
            if query.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print!("{}", output::format_answer(&answer));
            }
        }
        Command::Search { query, options } => {
            let sources = engine.search(&query, options.resolve(engine.default_options())).await?;
            if options.json {
                println!("{}", serde_json::to_string_pretty(&sources)?);
            } else {
                print!("{}", output::format_sources(&sources));
            }
        }
        Command::Delete { id } => {
            engine.delete_document(&id).await?;
            println!("Deleted {id}");
        }
        Command::List { json } => {
            let docs = engine.list_documents();
            if json {
                println!("{}", serde_json::to_string_pretty(&docs)?);
            } else {
                print!("{}", output::format_documents(&docs));
            }
        }
        Command::Summarize { id } => {
            let summary = engine.summarize_document(&id).await?;
            println!("{}\n\n{}", summary.title, summary.summary.trim());
        }
        Command::Status { json } => {
            let status = engine.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", output::format_status(&status));
            }
        }
    }
    Ok(())
}

async fn ingest(engine: &QaEngine, paths: &[PathBuf]) -> Result<()> {
    let files = loader::collect_files(paths)?;
    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        match loader::load_document(file) {
            Ok(doc) => documents.push(doc),
            Err(e) => eprintln!("skipping {}: {e:#}", file.display()),
        }
    }
    if documents.is_empty() {
        println!("No documents to ingest.");
        return Ok(());
    }

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")?
            .progress_chars("#>-"),
    );
    let results = engine
        .ingest_many_with(documents, |id, _| {
            pb.set_message(id.to_string());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    let mut failed = 0usize;
    for (id, result) in &results {
        if let Err(e) = result {
            failed += 1;
            eprintln!("failed {id}: {e}");
        }
    }
    println!("Ingested {} of {} documents", results.len() - failed, results.len());
    Ok(())
}
