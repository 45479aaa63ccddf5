
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::extractor::Clause;

/// A clause as stored in the metadata database, keyed by its index position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClauseRow {
    pub position: i64,
    pub clause_id: String,
    pub text: String,
    pub page: Option<i64>,
    pub file: String,
    pub indexed_at: NaiveDateTime,
}

impl ClauseRow {
    #[inline]
    pub fn into_clause(self) -> Clause {
        Clause {
            text: self.text,
            clause_id: self.clause_id,
            page: self.page.and_then(|page| u32::try_from(page).ok()),
            file: self.file,
        }
    }
}

impl From<ClauseRow> for Clause {
    #[inline]
    fn from(row: ClauseRow) -> Self {
        row.into_clause()
    }
}

/// Aggregate counts over the stored clauses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseStatistics {
    pub total_clauses: i64,
    pub distinct_files: i64,
    pub last_indexed_at: Option<NaiveDateTime>,
}
