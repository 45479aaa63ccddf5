use thiserror::Error;

pub type Result<T> = std::result::Result<T, LexiqError>;

#[derive(Error, Debug)]
pub enum LexiqError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Generation service error: {0}")]
    GenerationService(String),

    #[error("No documents indexed yet. Index documents before asking questions")]
    NoIndex,

    #[error("Dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Length mismatch: {vectors} vectors for {clauses} clauses")]
    LengthMismatch { vectors: usize, clauses: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod session;
