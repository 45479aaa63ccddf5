// Retrieval session
// Owns the vector index and drives indexing and question answering


use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::EmbeddingService;
use crate::extractor::{self, Clause};
use crate::generation::{GenerationParams, GenerationService};
use crate::index::{SearchHit, VectorIndex};
use crate::{LexiqError, Result};

pub const NO_RESULTS_ANSWER: &str = "No relevant information found in the uploaded documents.";
pub const NO_RESULTS_RATIONALE: &str = "No matching clauses found.";

/// The answer to one question, with the clauses it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub query: String,
    pub answer: String,
    pub relevant_clauses: Vec<Clause>,
    pub confidence_score: Option<f32>,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub indexed_document_count: usize,
    pub total_clause_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    Indexed { clauses: usize },
    Failed { error: String },
}

/// What happened to one file of an indexing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.status, FileStatus::Indexed { .. })
    }
}

/// Per-file results of [`Session::index_documents`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub outcomes: Vec<FileOutcome>,
}

impl IndexReport {
    /// Number of clauses added across all files
    #[inline]
    pub fn total_clauses(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome.status {
                FileStatus::Indexed { clauses } => clauses,
                FileStatus::Failed { .. } => 0,
            })
            .sum()
    }

    #[inline]
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    #[inline]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Build the generation prompt from retrieved clauses and the question
#[inline]
pub fn build_prompt(question: &str, hits: &[SearchHit]) -> String {
    let context = hits.iter().map(|hit| hit.clause.text.as_str()).join("\n\n");
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer with rationale and cite relevant clauses.",
        context, question
    )
}

/// A question answering session over one index.
///
/// The session is the only owner of its [`VectorIndex`]; wrap it in a lock
/// when sharing it between tasks.
pub struct Session<E, G> {
    config: Config,
    embedder: E,
    generator: G,
    index: Option<VectorIndex>,
}

impl<E, G> Session<E, G>
where
    E: EmbeddingService,
    G: GenerationService,
{
    /// Start a session with no index attached
    #[inline]
    pub fn new(config: Config, embedder: E, generator: G) -> Self {
        Self {
            config,
            embedder,
            generator,
            index: None,
        }
    }

    /// Start a session attached to the persisted index, if one exists
    #[inline]
    pub async fn resume(config: Config, embedder: E, generator: G) -> Result<Self> {
        let index = VectorIndex::open_existing(&config.storage_paths()).await?;
        if let Some(index) = &index {
            info!("Resumed index with {} clauses", index.len());
        }

        Ok(Self {
            config,
            embedder,
            generator,
            index,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    /// Index every file independently; a failing file does not stop the others
    #[inline]
    pub async fn index_documents<P: AsRef<Path>>(&mut self, paths: &[P]) -> IndexReport {
        self.index_documents_with(paths, |_| {}).await
    }

    /// Like [`Session::index_documents`], calling `on_outcome` as each file finishes
    #[inline]
    pub async fn index_documents_with<P, F>(
        &mut self,
        paths: &[P],
        mut on_outcome: F,
    ) -> IndexReport
    where
        P: AsRef<Path>,
        F: FnMut(&FileOutcome),
    {
        let mut report = IndexReport::default();

        for path in paths {
            let outcome = self.index_document(path.as_ref()).await;
            on_outcome(&outcome);
            report.outcomes.push(outcome);
        }

        info!(
            "Indexed {} clauses from {} files ({} failed)",
            report.total_clauses(),
            report.outcomes.len(),
            report.failures().count()
        );
        report
    }

    /// Index a single file and report its outcome
    #[inline]
    pub async fn index_document(&mut self, path: &Path) -> FileOutcome {
        let status = match self.try_index_document(path).await {
            Ok(clauses) => FileStatus::Indexed { clauses },
            Err(e) => {
                warn!("Failed to index {}: {}", path.display(), e);
                FileStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        FileOutcome {
            path: path.to_path_buf(),
            status,
        }
    }

    async fn try_index_document(&mut self, path: &Path) -> Result<usize> {
        let clauses = extractor::extract_clauses(path)?;
        if clauses.is_empty() {
            debug!("{} produced no clauses", path.display());
            return Ok(0);
        }

        let texts: Vec<String> = clauses.iter().map(|clause| clause.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        let count = clauses.len();
        if vectors.len() != count {
            return Err(LexiqError::LengthMismatch {
                vectors: vectors.len(),
                clauses: count,
            });
        }

        if self.index.is_none() {
            let dimension = vectors.first().map_or(0, Vec::len);
            let index = VectorIndex::open(&self.config.storage_paths(), dimension).await?;
            self.index = Some(index);
        }

        let index = self.index.as_mut().ok_or(LexiqError::NoIndex)?;
        index.add(vectors, clauses).await?;
        debug!("Indexed {} clauses from {}", count, path.display());
        Ok(count)
    }

    /// Answer `question` from the `top_k` configured nearest clauses
    #[inline]
    pub fn ask(&self, question: &str) -> Result<AnswerRecord> {
        self.ask_with_top_k(question, self.config.retrieval.top_k)
    }

    #[inline]
    pub fn ask_with_top_k(&self, question: &str, top_k: usize) -> Result<AnswerRecord> {
        let index = self.index.as_ref().ok_or(LexiqError::NoIndex)?;

        let query_vector = self.embedder.embed(question)?;
        let hits = index.search(&query_vector, top_k)?;
        debug!("Retrieved {} clauses for question", hits.len());

        if hits.is_empty() {
            return Ok(AnswerRecord {
                query: question.to_string(),
                answer: NO_RESULTS_ANSWER.to_string(),
                relevant_clauses: Vec::new(),
                confidence_score: None,
                rationale: NO_RESULTS_RATIONALE.to_string(),
            });
        }

        let prompt = build_prompt(question, &hits);
        let params = GenerationParams::from(&self.config.retrieval);
        let generated = self.generator.generate(&prompt, &params)?;

        Ok(AnswerRecord {
            query: question.to_string(),
            answer: generated.clone(),
            relevant_clauses: hits.into_iter().map(|hit| hit.clause).collect(),
            confidence_score: None,
            rationale: generated,
        })
    }

    /// Distinct documents and clauses in the attached index
    #[inline]
    pub fn status(&self) -> IndexStatus {
        self.index
            .as_ref()
            .map(|index| IndexStatus {
                indexed_document_count: index
                    .clauses()
                    .iter()
                    .map(|clause| clause.file.as_str())
                    .unique()
                    .count(),
                total_clause_count: index.len(),
            })
            .unwrap_or_default()
    }

    /// Detach the in-memory index, leaving durable storage untouched
    #[inline]
    pub fn clear(&mut self) {
        if self.index.take().is_some() {
            info!("Detached index from session");
        }
    }

    /// Detach the index and erase its durable storage
    #[inline]
    pub async fn purge(&mut self) -> Result<()> {
        self.clear();
        VectorIndex::purge_storage(&self.config.storage_paths()).await
    }
}
