use super::*;
use tempfile::TempDir;

async fn create_test_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(&temp_dir.path().join("vectors"))
        .await
        .expect("should open vector store");
    (store, temp_dir)
}

fn test_vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|i| (0..dimension).map(|d| (i * dimension + d) as f32 * 0.1).collect())
        .collect()
}

#[tokio::test]
async fn open_does_not_create_table() {
    let (store, _temp_dir) = create_test_store().await;

    assert!(!store.table_exists().await.expect("should list tables"));
    assert_eq!(store.dimension().await.expect("should read dimension"), None);
    assert_eq!(store.count().await.expect("should count"), 0);
    assert!(store.load_all().await.expect("should load").is_empty());
}

#[tokio::test]
async fn create_table_records_dimension() {
    let (store, _temp_dir) = create_test_store().await;

    store.create_table(5).await.expect("should create table");

    assert!(store.table_exists().await.expect("should list tables"));
    assert_eq!(
        store.dimension().await.expect("should read dimension"),
        Some(5)
    );
}

#[tokio::test]
async fn append_and_load_in_position_order() {
    let (store, _temp_dir) = create_test_store().await;
    store.create_table(3).await.expect("should create table");

    let vectors = test_vectors(4, 3);
    store
        .append(0, &vectors[..2])
        .await
        .expect("should append first batch");
    store
        .append(2, &vectors[2..])
        .await
        .expect("should append second batch");

    let records = store.load_all().await.expect("should load vectors");
    let positions: Vec<u64> = records.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
    assert_eq!(records[3].vector, vectors[3]);
    assert_eq!(store.count().await.expect("should count"), 4);
}

#[tokio::test]
async fn append_rejects_wrong_dimension() {
    let (store, _temp_dir) = create_test_store().await;
    store.create_table(3).await.expect("should create table");

    let result = store.append(0, &[vec![1.0, 2.0]]).await;
    assert!(matches!(
        result,
        Err(LexiqError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[tokio::test]
async fn append_without_table_fails() {
    let (store, _temp_dir) = create_test_store().await;

    let result = store.append(0, &[vec![1.0]]).await;
    assert!(matches!(result, Err(LexiqError::Database(_))));
}

#[tokio::test]
async fn delete_from_truncates_tail() {
    let (store, _temp_dir) = create_test_store().await;
    store.create_table(2).await.expect("should create table");
    store
        .append(0, &test_vectors(5, 2))
        .await
        .expect("should append");

    store.delete_from(2).await.expect("should delete");

    let records = store.load_all().await.expect("should load vectors");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.position < 2));
}

#[tokio::test]
async fn create_table_replaces_existing_rows() {
    let (store, _temp_dir) = create_test_store().await;
    store.create_table(2).await.expect("should create table");
    store
        .append(0, &test_vectors(3, 2))
        .await
        .expect("should append");

    store.create_table(4).await.expect("should recreate table");

    assert_eq!(store.count().await.expect("should count"), 0);
    assert_eq!(
        store.dimension().await.expect("should read dimension"),
        Some(4)
    );
}

#[tokio::test]
async fn reopen_sees_persisted_vectors() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");

    {
        let store = VectorStore::open(&path).await.expect("should open store");
        store.create_table(2).await.expect("should create table");
        store
            .append(0, &test_vectors(2, 2))
            .await
            .expect("should append");
    }

    let store = VectorStore::open(&path).await.expect("should reopen store");
    assert_eq!(
        store.dimension().await.expect("should read dimension"),
        Some(2)
    );
    assert_eq!(store.load_all().await.expect("should load").len(), 2);
}
