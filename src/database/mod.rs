// Database module
// Dual storage for the persisted index: LanceDB for vectors, SQLite for clause metadata

pub mod lancedb;
pub mod sqlite;

use std::path::PathBuf;

pub use self::lancedb::{VECTOR_TABLE, VectorRecord, VectorStore};
pub use self::sqlite::Database;
pub use self::sqlite::models::{ClauseRow, ClauseStatistics};

/// The two storage locations that together hold a persisted index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    /// Directory of the LanceDB vector store
    pub vector_store: PathBuf,
    /// SQLite database file holding clause metadata
    pub metadata_store: PathBuf,
}

impl StoragePaths {
    #[inline]
    pub fn new(vector_store: impl Into<PathBuf>, metadata_store: impl Into<PathBuf>) -> Self {
        Self {
            vector_store: vector_store.into(),
            metadata_store: metadata_store.into(),
        }
    }

    /// Storage locations for an index kept entirely under `dir`
    #[inline]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            vector_store: dir.join("vectors"),
            metadata_store: dir.join("metadata.db"),
        }
    }
}
