#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::extractor::Clause;

pub struct ClauseQueries;

impl ClauseQueries {
    /// Insert clauses at consecutive positions starting at `start_position`
    #[inline]
    pub async fn insert_batch(
        pool: &SqlitePool,
        start_position: u64,
        clauses: &[Clause],
    ) -> Result<()> {
        if clauses.is_empty() {
            return Ok(());
        }

        let mut transaction = pool
            .begin()
            .await
            .context("Failed to begin transaction for batch clause insert")?;

        Self::insert_rows(&mut transaction, start_position, clauses).await?;

        transaction
            .commit()
            .await
            .context("Failed to commit batch clause insert transaction")?;

        debug!(
            "Inserted {} clauses starting at position {}",
            clauses.len(),
            start_position
        );
        Ok(())
    }

    /// Replace every stored clause with `clauses`, positioned from zero
    #[inline]
    pub async fn replace_all(pool: &SqlitePool, clauses: &[Clause]) -> Result<()> {
        let mut transaction = pool
            .begin()
            .await
            .context("Failed to begin transaction for clause rewrite")?;

        sqlx::query("DELETE FROM clauses")
            .execute(&mut *transaction)
            .await
            .context("Failed to clear clauses")?;

        Self::insert_rows(&mut transaction, 0, clauses).await?;

        transaction
            .commit()
            .await
            .context("Failed to commit clause rewrite transaction")?;

        debug!("Rewrote clause table with {} clauses", clauses.len());
        Ok(())
    }

    async fn insert_rows(
        transaction: &mut Transaction<'_, Sqlite>,
        start_position: u64,
        clauses: &[Clause],
    ) -> Result<()> {
        let now = Utc::now().naive_utc();

        for (offset, clause) in (0u64..).zip(clauses) {
            let position = i64::try_from(start_position + offset)
                .context("Clause position does not fit in the database")?;

            sqlx::query(
                "INSERT INTO clauses (position, clause_id, text, page, file, indexed_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(position)
            .bind(&clause.clause_id)
            .bind(&clause.text)
            .bind(clause.page.map(i64::from))
            .bind(&clause.file)
            .bind(now)
            .execute(&mut **transaction)
            .await
            .with_context(|| format!("Failed to insert clause at position {}", position))?;
        }

        Ok(())
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ClauseRow>> {
        let rows = sqlx::query_as::<_, ClauseRow>(
            r#"
            SELECT position, clause_id, text, page, file, indexed_at
            FROM clauses
            ORDER BY position
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to list clauses")?;

        Ok(rows)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clauses")
            .fetch_one(pool)
            .await
            .context("Failed to count clauses")?;

        Ok(count)
    }

    #[inline]
    pub async fn statistics(pool: &SqlitePool) -> Result<ClauseStatistics> {
        let (total_clauses, distinct_files, last_indexed_at): (i64, i64, Option<NaiveDateTime>) =
            sqlx::query_as(
                "SELECT COUNT(*), COUNT(DISTINCT file), MAX(indexed_at) FROM clauses",
            )
            .fetch_one(pool)
            .await
            .context("Failed to get clause statistics")?;

        Ok(ClauseStatistics {
            total_clauses,
            distinct_files,
            last_indexed_at,
        })
    }

    /// Delete every clause at or beyond `position`, returning the number removed
    #[inline]
    pub async fn delete_from(pool: &SqlitePool, position: u64) -> Result<u64> {
        let position = i64::try_from(position).unwrap_or(i64::MAX);

        let result = sqlx::query("DELETE FROM clauses WHERE position >= ?")
            .bind(position)
            .execute(pool)
            .await
            .context("Failed to delete trailing clauses")?;

        Ok(result.rows_affected())
    }

    #[inline]
    pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM clauses")
            .execute(pool)
            .await
            .context("Failed to delete clauses")?;

        Ok(result.rows_affected())
    }
}
