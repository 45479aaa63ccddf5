use super::*;
use crate::database::sqlite::Database;
use anyhow::Result;
use tempfile::TempDir;

async fn create_test_pool() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::new(temp_dir.path().join("metadata.db")).await?;
    Ok((temp_dir, database))
}

fn pdf_clause(page: u32, block: usize) -> Clause {
    Clause {
        text: format!("Page {} block {}", page, block),
        clause_id: format!("contract.pdf_p{}_b{}", page, block),
        page: Some(page),
        file: "contract.pdf".to_string(),
    }
}

#[tokio::test]
async fn insert_batch_round_trips_page_numbers() -> Result<()> {
    let (_temp_dir, database) = create_test_pool().await?;
    let pool = database.pool();

    ClauseQueries::insert_batch(pool, 0, &[pdf_clause(1, 0), pdf_clause(2, 0)]).await?;

    let rows = ClauseQueries::list_all(pool).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].page, Some(1));
    assert_eq!(rows[1].page, Some(2));
    assert_eq!(rows[1].clone().into_clause(), pdf_clause(2, 0));

    Ok(())
}

#[tokio::test]
async fn insert_batch_with_nothing_is_noop() -> Result<()> {
    let (_temp_dir, database) = create_test_pool().await?;

    ClauseQueries::insert_batch(database.pool(), 0, &[]).await?;
    assert_eq!(ClauseQueries::count(database.pool()).await?, 0);

    Ok(())
}

#[tokio::test]
async fn duplicate_position_fails_whole_batch() -> Result<()> {
    let (_temp_dir, database) = create_test_pool().await?;
    let pool = database.pool();

    ClauseQueries::insert_batch(pool, 0, &[pdf_clause(1, 0)]).await?;
    let result = ClauseQueries::insert_batch(pool, 0, &[pdf_clause(1, 1)]).await;

    assert!(result.is_err());
    assert_eq!(ClauseQueries::count(pool).await?, 1);

    Ok(())
}

#[tokio::test]
async fn delete_from_truncates_tail() -> Result<()> {
    let (_temp_dir, database) = create_test_pool().await?;
    let pool = database.pool();

    let clauses: Vec<Clause> = (0..5).map(|block| pdf_clause(1, block)).collect();
    ClauseQueries::insert_batch(pool, 0, &clauses).await?;

    assert_eq!(ClauseQueries::delete_from(pool, 3).await?, 2);
    assert_eq!(ClauseQueries::count(pool).await?, 3);
    assert_eq!(ClauseQueries::delete_from(pool, u64::MAX).await?, 0);

    Ok(())
}

#[tokio::test]
async fn replace_all_renumbers_from_zero() -> Result<()> {
    let (_temp_dir, database) = create_test_pool().await?;
    let pool = database.pool();

    ClauseQueries::insert_batch(pool, 10, &[pdf_clause(9, 0)]).await?;
    ClauseQueries::replace_all(pool, &[pdf_clause(1, 0), pdf_clause(1, 1)]).await?;

    let rows = ClauseQueries::list_all(pool).await?;
    let positions: Vec<i64> = rows.iter().map(|row| row.position).collect();
    assert_eq!(positions, vec![0, 1]);
    assert_eq!(rows[0].clause_id, "contract.pdf_p1_b0");

    Ok(())
}
