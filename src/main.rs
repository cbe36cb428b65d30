use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ragkit::commands::{format_rag_answer, generate, index, rag, search_store, structured};
use ragkit::config::{Config, load_dotenv, run_interactive_config, show_config};
use ragkit::providers::Provider;
use tracing::debug;

#[derive(Parser)]
#[command(name = "ragkit")]
#[command(about = "Chunk, embed, search and answer over local documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the provider and pipeline settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Generate free text from a prompt
    Generate {
        #[arg(long)]
        prompt: String,
    },
    /// Generate a validated JSON record with title, summary and keywords
    Structured {
        #[arg(long)]
        prompt: String,
    },
    /// Chunk and embed a folder of text documents into a vector store
    Index {
        /// Folder containing .txt, .md and .markdown files
        #[arg(long, default_value = "./sample_docs")]
        docs_dir: PathBuf,
        /// Where to write the vector store
        #[arg(long, default_value = "./data/vectorstore.json")]
        out: PathBuf,
    },
    /// Find the chunks most similar to a query
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "./data/vectorstore.json")]
        store: PathBuf,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Answer a query from retrieved chunks with inline citations
    Rag {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "./data/vectorstore.json")]
        store: PathBuf,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
}

fn main() -> Result<()> {
    let dotenv = load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();

    if let Commands::Config { show } = cli.command {
        if show {
            show_config()?;
        } else {
            run_interactive_config()?;
        }
        return Ok(());
    }

    let config = Config::load()?;
    let provider = Provider::from_config(&config)?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Generate { prompt } => {
            println!("{}", generate(&prompt, &provider)?);
        }
        Commands::Structured { prompt } => {
            let output = structured(&prompt, &provider, config.structured.max_retries)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Index { docs_dir, out } => {
            let report = index(&docs_dir, &out, &provider, &config)?;
            println!(
                "Indexed {} chunks -> {}",
                report.chunks,
                report.output_path.display()
            );
        }
        Commands::Search {
            query,
            store,
            top_k,
        } => {
            let results = search_store(&store, &query, top_k, &provider)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Rag {
            query,
            store,
            top_k,
        } => {
            let answer = rag(&store, &query, top_k, &provider)?;
            println!("{}", format_rag_answer(&answer)?);
        }
    }

    Ok(())
}
