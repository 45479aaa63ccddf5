use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::new(temp_dir.path().join("metadata.db")).await?;
    Ok((temp_dir, database))
}

fn clause(file: &str, index: usize) -> Clause {
    Clause {
        text: format!("Clause {} of {}", index, file),
        clause_id: format!("{}_eml{}", file, index),
        page: None,
        file: file.to_string(),
    }
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
    )
    .fetch_all(database.pool())
    .await?;

    let expected_tables: HashSet<&'static str> = ["clauses"].into_iter().collect();
    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, expected_tables);

    Ok(())
}

#[tokio::test]
async fn creates_missing_parent_directory() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("nested").join("metadata.db");

    let database = Database::new(&path).await?;
    assert_eq!(database.clause_count().await?, 0);
    assert!(path.exists());

    Ok(())
}

#[tokio::test]
async fn append_and_list_preserves_positions() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    database
        .append_clauses(0, &[clause("a.eml", 0), clause("a.eml", 1)])
        .await?;
    database.append_clauses(2, &[clause("b.eml", 0)]).await?;

    let rows = database.list_clauses().await?;
    let positions: Vec<i64> = rows.iter().map(|row| row.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(rows[2].clause_id, "b.eml_eml0");

    let stats = database.statistics().await?;
    assert_eq!(stats.total_clauses, 3);
    assert_eq!(stats.distinct_files, 2);
    assert!(stats.last_indexed_at.is_some());

    Ok(())
}

#[tokio::test]
async fn reopening_keeps_clauses() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("metadata.db");

    {
        let database = Database::new(&path).await?;
        database.append_clauses(0, &[clause("a.eml", 0)]).await?;
        database.close().await;
    }

    let database = Database::new(&path).await?;
    assert_eq!(database.clause_count().await?, 1);

    Ok(())
}

#[tokio::test]
async fn clear_removes_everything() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    database
        .append_clauses(0, &[clause("a.eml", 0), clause("a.eml", 1)])
        .await?;
    assert_eq!(database.clear().await?, 2);
    assert_eq!(database.statistics().await?, ClauseStatistics::default());

    Ok(())
}
