// Storage consistency validation
// Cross-checks the vector store against the clause metadata by position


use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::database::{Database, VectorStore};
use crate::{LexiqError, Result};

/// Consistency check results between the vector store and the metadata store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Number of rows in the vector store
    pub vector_rows: usize,
    /// Number of rows in the metadata store
    pub metadata_rows: usize,
    /// Positions that have a vector but no clause metadata
    pub missing_metadata: Vec<u64>,
    /// Positions that have clause metadata but no vector
    pub missing_vectors: Vec<u64>,
    /// Positions stored more than once in the vector store
    pub duplicate_vectors: Vec<u64>,
    /// Length of the prefix `0..n` present in both stores
    pub consistent_prefix: usize,
    /// Highest position found in either store
    pub max_position: Option<u64>,
    /// Overall consistency status
    pub is_consistent: bool,
}

impl ConsistencyReport {
    /// Compare the positions found in each store
    #[inline]
    pub fn from_positions(vector_positions: &[u64], metadata_positions: &[u64]) -> Self {
        let mut vector_counts: BTreeMap<u64, usize> = BTreeMap::new();
        for position in vector_positions {
            *vector_counts.entry(*position).or_default() += 1;
        }
        let metadata_set: BTreeSet<u64> = metadata_positions.iter().copied().collect();

        let missing_metadata: Vec<u64> = vector_counts
            .keys()
            .filter(|position| !metadata_set.contains(position))
            .copied()
            .collect();

        let missing_vectors: Vec<u64> = metadata_set
            .iter()
            .filter(|position| !vector_counts.contains_key(position))
            .copied()
            .collect();

        let duplicate_vectors: Vec<u64> = vector_counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(position, _)| *position)
            .collect();

        let mut consistent_prefix = 0usize;
        while vector_counts.contains_key(&(consistent_prefix as u64))
            && metadata_set.contains(&(consistent_prefix as u64))
        {
            consistent_prefix += 1;
        }

        let max_position = vector_counts
            .keys()
            .next_back()
            .max(metadata_set.iter().next_back())
            .copied();

        let is_consistent = vector_positions.len() == consistent_prefix
            && metadata_positions.len() == consistent_prefix;

        Self {
            vector_rows: vector_positions.len(),
            metadata_rows: metadata_positions.len(),
            missing_metadata,
            missing_vectors,
            duplicate_vectors,
            consistent_prefix,
            max_position,
            is_consistent,
        }
    }

    /// Whether rows exist beyond the consistent prefix in either store
    #[inline]
    pub fn has_trailing_rows(&self) -> bool {
        self.max_position
            .is_some_and(|position| position >= self.consistent_prefix as u64)
    }

    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Storage is consistent: {} vectors, {} clauses",
                self.vector_rows, self.metadata_rows
            )
        } else {
            format!(
                "Storage inconsistencies found: {} positions missing metadata, {} missing vectors, {} duplicated vectors; {} usable entries",
                self.missing_metadata.len(),
                self.missing_vectors.len(),
                self.duplicate_vectors.len(),
                self.consistent_prefix
            )
        }
    }

    /// Get the total number of consistency issues
    #[inline]
    pub fn total_issues(&self) -> usize {
        self.missing_metadata.len() + self.missing_vectors.len() + self.duplicate_vectors.len()
    }

    fn log_issues(&self) {
        if !self.missing_metadata.is_empty() {
            warn!(
                "Found {} vectors without clause metadata",
                self.missing_metadata.len()
            );
        }

        if !self.missing_vectors.is_empty() {
            warn!(
                "Found {} clauses without vectors",
                self.missing_vectors.len()
            );
        }

        if !self.duplicate_vectors.is_empty() {
            warn!(
                "Found {} positions stored more than once in the vector store",
                self.duplicate_vectors.len()
            );
        }
    }
}

/// Performs consistency validation between the two index stores
pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    vector_store: &'a VectorStore,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(database: &'a Database, vector_store: &'a VectorStore) -> Self {
        Self {
            database,
            vector_store,
        }
    }

    /// Read positions from both stores and compare them
    #[inline]
    pub async fn validate(&self) -> Result<ConsistencyReport> {
        info!("Starting storage consistency validation");

        let vector_positions: Vec<u64> = self
            .vector_store
            .load_all()
            .await?
            .into_iter()
            .map(|record| record.position)
            .collect();
        debug!("Found {} vectors", vector_positions.len());

        let metadata_positions = self
            .database
            .list_clauses()
            .await
            .map_err(|e| LexiqError::Database(format!("{:#}", e)))?
            .into_iter()
            .filter_map(|row| u64::try_from(row.position).ok())
            .collect::<Vec<_>>();
        debug!("Found {} clauses", metadata_positions.len());

        let report = ConsistencyReport::from_positions(&vector_positions, &metadata_positions);
        self.log_report(&report);
        Ok(report)
    }

    /// Delete every row beyond the consistent prefix from both stores
    #[inline]
    pub async fn truncate_to_prefix(&self, report: &ConsistencyReport) -> Result<()> {
        if !report.has_trailing_rows() {
            return Ok(());
        }

        let prefix = report.consistent_prefix as u64;
        warn!(
            "Removing storage rows from position {} to restore consistency",
            prefix
        );

        self.vector_store.delete_from(prefix).await?;
        self.database
            .delete_clauses_from(prefix)
            .await
            .map_err(|e| LexiqError::Database(format!("{:#}", e)))?;

        Ok(())
    }

    #[inline]
    pub fn log_report(&self, report: &ConsistencyReport) {
        if report.is_consistent {
            debug!("{}", report.summary());
        } else {
            warn!("{}", report.summary());
            report.log_issues();
        }
    }
}
