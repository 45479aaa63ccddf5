use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{ClauseRow, ClauseStatistics};
use crate::database::sqlite::queries::ClauseQueries;
use crate::extractor::Clause;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// Clause metadata store, the relational half of the persisted index
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let database_path = database_path.as_ref();

        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create metadata directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn append_clauses(&self, start_position: u64, clauses: &[Clause]) -> Result<()> {
        ClauseQueries::insert_batch(&self.pool, start_position, clauses).await
    }

    pub async fn replace_clauses(&self, clauses: &[Clause]) -> Result<()> {
        ClauseQueries::replace_all(&self.pool, clauses).await
    }

    pub async fn list_clauses(&self) -> Result<Vec<ClauseRow>> {
        ClauseQueries::list_all(&self.pool).await
    }

    pub async fn clause_count(&self) -> Result<i64> {
        ClauseQueries::count(&self.pool).await
    }

    pub async fn statistics(&self) -> Result<ClauseStatistics> {
        ClauseQueries::statistics(&self.pool).await
    }

    pub async fn delete_clauses_from(&self, position: u64) -> Result<u64> {
        ClauseQueries::delete_from(&self.pool, position).await
    }

    pub async fn clear(&self) -> Result<u64> {
        ClauseQueries::delete_all(&self.pool).await
    }

    /// Close the pool so the database file can be removed or reopened
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
