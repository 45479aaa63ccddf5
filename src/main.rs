use anyhow::Result;
use clap::{Parser, Subcommand};
use lexiq::commands::{ask_question, check_health, clear_index, index_files, show_status};
use lexiq::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lexiq")]
#[command(about = "Clause-level question answering over PDF, DOCX and email documents")]
#[command(version)]
struct Cli {
    /// Directory holding the configuration and index storage
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, embed and index documents (.pdf, .docx, .eml)
    Index {
        /// Files to index
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Answer a question from the indexed documents
    Ask {
        question: String,
        /// Number of clauses to retrieve (defaults to the configured value)
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the answer record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show document and clause counts
    Status {
        /// Cross-check the vector store against the clause metadata
        #[arg(long)]
        verify: bool,
    },
    /// Remove every indexed clause
    Clear {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Check the Ollama server and configured models
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Index { files } => {
            let report = index_files(&config_dir, &files).await?;
            if report.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Ask {
            question,
            top_k,
            json,
        } => {
            ask_question(&config_dir, &question, top_k, json).await?;
        }
        Commands::Status { verify } => {
            show_status(&config_dir, verify).await?;
        }
        Commands::Clear { yes } => {
            clear_index(&config_dir, yes).await?;
        }
        Commands::Health => {
            check_health(&config_dir)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
