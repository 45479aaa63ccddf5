// Vector index
// Exact L2 nearest-neighbour search over clause embeddings, persisted to LanceDB and SQLite

pub mod consistency;


use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::database::{Database, StoragePaths, VectorStore};
use crate::extractor::Clause;
use crate::{LexiqError, Result};
pub use consistency::{ConsistencyReport, ConsistencyValidator};

/// One search result: a stored clause and its distance to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub clause: Clause,
    /// Squared Euclidean distance between the query and the clause vector
    pub distance: f32,
    /// Insertion position of the clause in the index
    pub position: usize,
}

/// Exact nearest-neighbour index with a parallel clause sequence.
///
/// Vectors are kept row-major in memory; position `i` of the vector store
/// always belongs to `clauses[i]`.
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<f32>,
    clauses: Vec<Clause>,
    storage: Option<IndexStorage>,
}

struct IndexStorage {
    paths: StoragePaths,
    vector_store: VectorStore,
    database: Database,
}

impl std::fmt::Debug for VectorIndex {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("len", &self.clauses.len())
            .field("storage", &self.storage.as_ref().map(|s| &s.paths))
            .finish()
    }
}

impl VectorIndex {
    /// Create an index that lives only in memory
    #[inline]
    pub fn in_memory(dimension: usize) -> Result<Self> {
        check_dimension(dimension)?;
        Ok(Self {
            dimension,
            vectors: Vec::new(),
            clauses: Vec::new(),
            storage: None,
        })
    }

    /// Open the index persisted at `paths`, or create an empty one of `dimension`.
    ///
    /// When a persisted index exists its stored dimension wins over `dimension`.
    #[inline]
    pub async fn open(paths: &StoragePaths, dimension: usize) -> Result<Self> {
        let storage = IndexStorage::open(paths).await?;

        match storage.vector_store.dimension().await? {
            Some(stored) => {
                if stored != dimension {
                    info!(
                        "Using stored vector dimension {} instead of requested {}",
                        stored, dimension
                    );
                }
                Self::load(storage, stored).await
            }
            None => {
                check_dimension(dimension)?;
                storage.vector_store.create_table(dimension).await?;

                let stale = storage.database.clear().await.map_err(database_error)?;
                if stale > 0 {
                    warn!("Removed {} clauses that had no vector store", stale);
                }

                info!("Created empty index with {} dimensions", dimension);
                Ok(Self {
                    dimension,
                    vectors: Vec::new(),
                    clauses: Vec::new(),
                    storage: Some(storage),
                })
            }
        }
    }

    /// Load the index persisted at `paths`, if there is one
    #[inline]
    pub async fn open_existing(paths: &StoragePaths) -> Result<Option<Self>> {
        if !paths.vector_store.exists() {
            return Ok(None);
        }

        let storage = IndexStorage::open(paths).await?;
        match storage.vector_store.dimension().await? {
            Some(stored) => Self::load(storage, stored).await.map(Some),
            None => {
                debug!("No persisted index at {}", paths.vector_store.display());
                Ok(None)
            }
        }
    }

    /// Remove everything persisted at `paths`
    #[inline]
    pub async fn purge_storage(paths: &StoragePaths) -> Result<()> {
        let storage = IndexStorage::open(paths).await?;
        storage.vector_store.drop_table_if_exists().await?;
        let removed = storage.database.clear().await.map_err(database_error)?;
        storage.database.close().await;

        info!("Purged index storage ({} clauses removed)", removed);
        Ok(())
    }

    /// Compare the storage at `paths` without loading or repairing it
    #[inline]
    pub async fn inspect_storage(paths: &StoragePaths) -> Result<Option<ConsistencyReport>> {
        if !paths.vector_store.exists() {
            return Ok(None);
        }

        let storage = IndexStorage::open(paths).await?;
        if !storage.vector_store.table_exists().await? {
            return Ok(None);
        }

        let validator = ConsistencyValidator::new(&storage.database, &storage.vector_store);
        let report = validator.validate().await?;
        storage.database.close().await;
        Ok(Some(report))
    }

    async fn load(storage: IndexStorage, dimension: usize) -> Result<Self> {
        let mut records = storage.vector_store.load_all().await?;
        let rows = storage.database.list_clauses().await.map_err(database_error)?;

        let vector_positions: Vec<u64> = records.iter().map(|r| r.position).collect();
        let metadata_positions: Vec<u64> = rows
            .iter()
            .filter_map(|row| u64::try_from(row.position).ok())
            .collect();
        let report = ConsistencyReport::from_positions(&vector_positions, &metadata_positions);

        let validator = ConsistencyValidator::new(&storage.database, &storage.vector_store);
        validator.log_report(&report);
        validator.truncate_to_prefix(&report).await?;

        let len = report.consistent_prefix;
        records.dedup_by_key(|record| record.position);

        let mut vectors = Vec::with_capacity(len * dimension);
        for record in records.iter().take(len) {
            if record.vector.len() != dimension {
                return Err(LexiqError::DimensionMismatch {
                    expected: dimension,
                    actual: record.vector.len(),
                });
            }
            vectors.extend_from_slice(&record.vector);
        }
        let clauses: Vec<Clause> = rows
            .into_iter()
            .filter(|row| row.position >= 0)
            .take(len)
            .map(Clause::from)
            .collect();

        let mut index = Self {
            dimension,
            vectors,
            clauses,
            storage: Some(storage),
        };

        if !report.duplicate_vectors.is_empty() {
            index.save().await?;
        }

        info!(
            "Loaded index with {} clauses ({} dimensions)",
            index.len(),
            dimension
        );
        Ok(index)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Stored clauses in insertion order
    #[inline]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    #[inline]
    pub fn storage_paths(&self) -> Option<&StoragePaths> {
        self.storage.as_ref().map(|storage| &storage.paths)
    }

    /// Append `vectors` paired with `clauses` and persist them.
    ///
    /// Nothing is written unless every vector matches the index dimension.
    #[inline]
    pub async fn add(&mut self, vectors: Vec<Vec<f32>>, clauses: Vec<Clause>) -> Result<()> {
        if vectors.len() != clauses.len() {
            return Err(LexiqError::LengthMismatch {
                vectors: vectors.len(),
                clauses: clauses.len(),
            });
        }

        if let Some(vector) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(LexiqError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        if vectors.is_empty() {
            return Ok(());
        }

        let start = self.len() as u64;
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.append(start, &vectors, &clauses).await {
                error!("Failed to persist {} clauses: {}", clauses.len(), e);
                storage.rollback(start).await;
                return Err(e);
            }
        }

        self.vectors.extend(vectors.into_iter().flatten());
        self.clauses.extend(clauses);

        debug!("Index now holds {} clauses", self.len());
        Ok(())
    }

    /// Up to `top_k` clauses closest to `query`, nearest first.
    ///
    /// Equal distances keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(LexiqError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .enumerate()
            .k_smallest_by(top_k, |a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .filter_map(|(position, distance)| {
                self.clauses.get(position).map(|clause| SearchHit {
                    clause: clause.clone(),
                    distance,
                    position,
                })
            })
            .collect();

        Ok(hits)
    }

    /// Rewrite both storage locations from memory
    #[inline]
    pub async fn save(&self) -> Result<()> {
        let Some(storage) = &self.storage else {
            debug!("In-memory index, nothing to save");
            return Ok(());
        };

        let vectors: Vec<Vec<f32>> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(<[f32]>::to_vec)
            .collect();

        storage.vector_store.create_table(self.dimension).await?;
        storage.vector_store.append(0, &vectors).await?;
        storage
            .database
            .replace_clauses(&self.clauses)
            .await
            .map_err(database_error)?;

        info!("Saved index with {} clauses", self.len());
        Ok(())
    }

    /// Discard every entry, in memory and in storage
    #[inline]
    pub async fn reset(&mut self) -> Result<()> {
        if let Some(storage) = &self.storage {
            storage.vector_store.create_table(self.dimension).await?;
            storage.database.clear().await.map_err(database_error)?;
        }

        self.vectors.clear();
        self.clauses.clear();

        info!("Index reset");
        Ok(())
    }

    /// Compare the two storage locations without modifying them
    #[inline]
    pub async fn check_consistency(&self) -> Result<Option<ConsistencyReport>> {
        match &self.storage {
            Some(storage) => {
                let validator =
                    ConsistencyValidator::new(&storage.database, &storage.vector_store);
                validator.validate().await.map(Some)
            }
            None => Ok(None),
        }
    }
}

impl IndexStorage {
    async fn open(paths: &StoragePaths) -> Result<Self> {
        let vector_store = VectorStore::open(&paths.vector_store).await?;
        let database = Database::new(&paths.metadata_store)
            .await
            .map_err(database_error)?;

        Ok(Self {
            paths: paths.clone(),
            vector_store,
            database,
        })
    }

    async fn append(&self, start: u64, vectors: &[Vec<f32>], clauses: &[Clause]) -> Result<()> {
        self.vector_store.append(start, vectors).await?;
        self.database
            .append_clauses(start, clauses)
            .await
            .map_err(database_error)
    }

    /// Best-effort removal of rows written past `start`
    async fn rollback(&self, start: u64) {
        if let Err(e) = self.vector_store.delete_from(start).await {
            warn!("Failed to roll back vectors from position {}: {}", start, e);
        }
        if let Err(e) = self.database.delete_clauses_from(start).await {
            warn!("Failed to roll back clauses from position {}: {:#}", start, e);
        }
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

fn check_dimension(dimension: usize) -> Result<()> {
    if dimension == 0 {
        return Err(anyhow::anyhow!("Vector dimension must be greater than zero").into());
    }
    Ok(())
}

fn database_error(e: anyhow::Error) -> LexiqError {
    LexiqError::Database(format!("{:#}", e))
}
