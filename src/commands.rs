use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::LexiqError;
use crate::config::Config;
use crate::database::Database;
use crate::embeddings::OllamaClient;
use crate::index::VectorIndex;
use crate::session::{AnswerRecord, FileStatus, IndexReport, Session};

type OllamaSession = Session<OllamaClient, OllamaClient>;

async fn open_session(config_dir: &Path) -> Result<OllamaSession> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let client = OllamaClient::new(&config).context("Failed to create Ollama client")?;

    Session::resume(config, client.clone(), client)
        .await
        .context("Failed to open index storage")
}

/// Index the given files, reporting each outcome as it completes
#[inline]
pub async fn index_files(config_dir: &Path, files: &[PathBuf]) -> Result<IndexReport> {
    info!("Indexing {} files", files.len());
    let mut session = open_session(config_dir).await?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(files.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexed {msg}")
                .context("Invalid progress template")?,
        )
    } else {
        ProgressBar::hidden()
    };

    let report = session
        .index_documents_with(files, |outcome| {
            let file = outcome.path.display();
            match &outcome.status {
                FileStatus::Indexed { clauses } => bar.println(format!(
                    "{} {} ({} clauses)",
                    style("✓").green(),
                    file,
                    clauses
                )),
                FileStatus::Failed { error } => {
                    bar.println(format!("{} {}: {}", style("✗").red(), file, error));
                }
            }
            bar.set_message(file.to_string());
            bar.inc(1);
        })
        .await;
    bar.finish_and_clear();

    let failures = report.failures().count();
    eprintln!();
    eprintln!(
        "Indexed {} clauses from {} of {} files",
        style(report.total_clauses()).cyan(),
        report.outcomes.len() - failures,
        report.outcomes.len()
    );
    if failures > 0 {
        warn!("{} files failed to index", failures);
        eprintln!("{}", style(format!("⚠ {} files failed", failures)).yellow());
    }

    Ok(report)
}

/// Answer a question from the persisted index
#[inline]
pub async fn ask_question(
    config_dir: &Path,
    question: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let session = open_session(config_dir).await?;
    let top_k = top_k.unwrap_or(session.config().retrieval.top_k);

    let record = match session.ask_with_top_k(question, top_k) {
        Ok(record) => record,
        Err(LexiqError::NoIndex) => {
            eprintln!("{}", style("No documents have been indexed yet.").yellow());
            eprintln!("Use 'lexiq index <FILES>...' to index documents first.");
            return Err(LexiqError::NoIndex.into());
        }
        Err(e) => {
            error!("Failed to answer question: {}", e);
            return Err(e.into());
        }
    };

    if json {
        let output =
            serde_json::to_string_pretty(&record).context("Failed to serialize answer")?;
        println!("{}", output);
    } else {
        print_answer(&record);
    }

    Ok(())
}

fn print_answer(record: &AnswerRecord) {
    println!("{}", record.answer);

    if record.relevant_clauses.is_empty() {
        return;
    }

    println!();
    println!("{}", style("Relevant clauses:").bold().yellow());
    for clause in &record.relevant_clauses {
        let location = match clause.page {
            Some(page) => format!("{}, page {}", clause.file, page),
            None => clause.file.clone(),
        };
        println!(
            "  {} {}",
            style(&clause.clause_id).cyan(),
            style(format!("({})", location)).dim()
        );
        println!("    {}", clause.text.replace('\n', "\n    "));
    }
}

/// Show index counts, optionally cross-checking both storage locations first
#[inline]
pub async fn show_status(config_dir: &Path, verify: bool) -> Result<()> {
    eprintln!("{}", style("📊 Index Status").bold().cyan());
    eprintln!();

    if verify {
        let config = Config::load(config_dir).context("Failed to load configuration")?;
        print_consistency(&config).await?;
    }

    let session = open_session(config_dir).await?;
    let config = session.config();

    let Some(index) = session.index() else {
        eprintln!("   📭 No documents indexed yet");
        eprintln!();
        eprintln!("💡 Use 'lexiq index <FILES>...' to index documents");
        return Ok(());
    };

    let status = session.status();
    eprintln!(
        "   📚 Documents: {}",
        style(status.indexed_document_count).cyan()
    );
    eprintln!("   📄 Clauses: {}", style(status.total_clause_count).cyan());
    eprintln!("   📐 Vector dimension: {}", style(index.dimension()).cyan());

    let database = Database::new(config.metadata_store_path())
        .await
        .context("Failed to open metadata store")?;
    let statistics = database.statistics().await?;
    if let Some(last) = statistics.last_indexed_at {
        eprintln!("   🕒 Last indexed: {}", style(last).cyan());
    }
    database.close().await;

    eprintln!(
        "   📁 Vector store: {}",
        style(config.vector_store_path().display()).dim()
    );
    eprintln!(
        "   📁 Metadata store: {}",
        style(config.metadata_store_path().display()).dim()
    );

    Ok(())
}

/// Report storage consistency as found on disk, before loading repairs it
async fn print_consistency(config: &Config) -> Result<()> {
    eprintln!("{}", style("🔍 Storage Consistency").bold().yellow());

    match VectorIndex::inspect_storage(&config.storage_paths()).await? {
        Some(report) if report.is_consistent => {
            eprintln!("   {} {}", style("✓").green(), report.summary());
        }
        Some(report) => {
            eprintln!("   {} {}", style("⚠").yellow(), report.summary());
            eprintln!("   Loading the index below repairs these issues.");
        }
        None => eprintln!("   No persisted index to verify"),
    }

    eprintln!();
    Ok(())
}

/// Erase the persisted index after confirmation
#[inline]
pub async fn clear_index(config_dir: &Path, assume_yes: bool) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    if !assume_yes
        && !dialoguer::Confirm::new()
            .with_prompt("Remove every indexed clause?")
            .default(false)
            .interact()?
    {
        eprintln!("Nothing removed.");
        return Ok(());
    }

    VectorIndex::purge_storage(&config.storage_paths())
        .await
        .context("Failed to clear index storage")?;

    eprintln!("{}", style("✓ Index cleared").green());
    Ok(())
}

/// Check the Ollama server and the configured models
#[inline]
pub fn check_health(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let client = OllamaClient::new(&config).context("Failed to create Ollama client")?;

    eprintln!("{}", style("🩺 Ollama Health").bold().cyan());
    eprintln!("   Server: {}", style(client.base_url()).cyan());

    if let Err(e) = client.ping() {
        eprintln!("   {} Server unreachable: {:#}", style("✗").red(), e);
        eprintln!("Use 'lexiq config' to update connection settings.");
        return Err(e);
    }
    eprintln!("   {} Server reachable", style("✓").green());

    let models = client.list_models()?;
    for model in [&config.ollama.embedding_model, &config.ollama.generation_model] {
        if models.iter().any(|m| &m.name == model) {
            eprintln!("   {} Model {} available", style("✓").green(), model);
        } else {
            eprintln!("   {} Model {} missing", style("✗").red(), model);
            eprintln!("     Run 'ollama pull {}' to install it.", model);
        }
    }

    client.validate_models()
}
