//! dqa — question answering over a local document directory.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::config::load_config;
use docqa::store::VectorStore;
use docqa::{ask, index, stats};

#[derive(Parser)]
#[command(
    name = "dqa",
    about = "Index a directory of documents and answer questions about them",
    version
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database.
    Init,

    /// Scan the docs directory and (re)index changed documents.
    Reindex {
        /// Re-embed every document even if its content is unchanged.
        #[arg(long)]
        force: bool,

        /// Show what would be indexed without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask a single question and print the answer with sources.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve.
        #[arg(short)]
        k: Option<usize>,
    },

    /// Interactive question-answering session.
    Chat {
        /// Number of chunks to retrieve per question.
        #[arg(short)]
        k: Option<usize>,
    },

    /// Show index counts and database details.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = VectorStore::open(&config.db.path).await?;
            store.close().await;
            println!("Index database initialized.");
        }
        Commands::Reindex { force, dry_run } => {
            index::run_reindex(&config, force, dry_run).await?;
        }
        Commands::Ask { question, k } => {
            ask::run_ask(&config, &question, k).await?;
        }
        Commands::Chat { k } => {
            ask::run_chat(&config, k).await?;
        }
        Commands::Status => {
            stats::run_status(&config).await?;
        }
    }

    Ok(())
}
