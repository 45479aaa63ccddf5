#[cfg(test)]
mod tests;

use super::{VECTOR_TABLE, VectorRecord};
use crate::LexiqError;
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vector half of the persisted index: one row per clause position
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    path: PathBuf,
}

impl VectorStore {
    /// Connect to the vector store at `path`, creating the directory if needed.
    ///
    /// The table itself is only created by [`VectorStore::create_table`].
    #[inline]
    pub async fn open(path: &Path) -> Result<Self, LexiqError> {
        debug!("Opening LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            LexiqError::Database(format!("Failed to create vector store directory: {}", e))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: VECTOR_TABLE.to_string(),
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub async fn table_exists(&self) -> Result<bool, LexiqError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// Vector dimension recorded in the table schema, if the table exists
    #[inline]
    pub async fn dimension(&self) -> Result<Option<usize>, LexiqError> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size).map(Some).map_err(|_| {
                        LexiqError::Database(format!("Invalid vector dimension: {}", size))
                    });
                }
            }
        }

        Err(LexiqError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create an empty table for vectors of `dimension`, replacing any existing one
    #[inline]
    pub async fn create_table(&self, dimension: usize) -> Result<(), LexiqError> {
        self.drop_table_if_exists().await?;

        info!("Creating vector table with {} dimensions", dimension);
        let schema = create_schema(dimension)?;
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    /// Append vectors at consecutive positions starting at `start_position`
    #[inline]
    pub async fn append(
        &self,
        start_position: u64,
        vectors: &[Vec<f32>],
    ) -> Result<(), LexiqError> {
        if vectors.is_empty() {
            debug!("No vectors to store");
            return Ok(());
        }

        let dimension = self.dimension().await?.ok_or_else(|| {
            LexiqError::Database("Vector table has not been created".to_string())
        })?;

        let record_batch = create_record_batch(dimension, start_position, vectors)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to insert vectors: {}", e)))?;

        debug!(
            "Stored {} vectors starting at position {}",
            vectors.len(),
            start_position
        );
        Ok(())
    }

    /// Read every stored vector, ordered by position
    #[inline]
    pub async fn load_all(&self) -> Result<Vec<VectorRecord>, LexiqError> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let mut stream = table
            .query()
            .select(lancedb::query::Select::columns(&["position", "vector"]))
            .execute()
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to query vectors: {}", e)))?;

        let mut records = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to read result stream: {}", e)))?
        {
            records.extend(parse_batch(&batch)?);
        }

        records.sort_by_key(|record| record.position);
        debug!("Loaded {} vectors", records.len());
        Ok(records)
    }

    #[inline]
    pub async fn count(&self) -> Result<usize, LexiqError> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Delete every vector at or beyond `position`
    #[inline]
    pub async fn delete_from(&self, position: u64) -> Result<(), LexiqError> {
        if !self.table_exists().await? {
            return Ok(());
        }

        let table = self.open_table().await?;
        let predicate = format!("position >= {}", position);
        table
            .delete(&predicate)
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to delete vectors: {}", e)))?;

        debug!("Deleted vectors from position {}", position);
        Ok(())
    }

    /// Drop the vector table if it exists
    #[inline]
    pub async fn drop_table_if_exists(&self) -> Result<(), LexiqError> {
        if self.table_exists().await? {
            info!("Dropping existing vector table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| LexiqError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    async fn open_table(&self) -> Result<lancedb::Table, LexiqError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LexiqError::Database(format!("Failed to open table: {}", e)))
    }
}

fn create_schema(dimension: usize) -> Result<Arc<Schema>, LexiqError> {
    let size = i32::try_from(dimension).map_err(|_| {
        LexiqError::Database(format!("Vector dimension too large: {}", dimension))
    })?;

    Ok(Arc::new(Schema::new(vec![
        Field::new("position", DataType::UInt64, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), size),
            false,
        ),
    ])))
}

fn create_record_batch(
    dimension: usize,
    start_position: u64,
    vectors: &[Vec<f32>],
) -> Result<RecordBatch, LexiqError> {
    let schema = create_schema(dimension)?;

    let mut positions = Vec::with_capacity(vectors.len());
    let mut flat_values = Vec::with_capacity(vectors.len() * dimension);
    for (offset, vector) in (0u64..).zip(vectors) {
        if vector.len() != dimension {
            return Err(LexiqError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        positions.push(start_position + offset);
        flat_values.extend_from_slice(vector);
    }

    let size = i32::try_from(dimension).map_err(|_| {
        LexiqError::Database(format!("Vector dimension too large: {}", dimension))
    })?;
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array =
        FixedSizeListArray::try_new(field, size, Arc::new(Float32Array::from(flat_values)), None)
            .map_err(|e| LexiqError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(UInt64Array::from(positions)),
        Arc::new(vector_array),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| LexiqError::Database(format!("Failed to create record batch: {}", e)))
}

fn parse_batch(batch: &RecordBatch) -> Result<Vec<VectorRecord>, LexiqError> {
    let positions = batch
        .column_by_name("position")
        .ok_or_else(|| LexiqError::Database("Missing position column".to_string()))?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| LexiqError::Database("Invalid position column type".to_string()))?;

    let vectors = batch
        .column_by_name("vector")
        .ok_or_else(|| LexiqError::Database("Missing vector column".to_string()))?
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| LexiqError::Database("Invalid vector column type".to_string()))?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if vectors.is_null(row) {
            warn!("Skipping null vector at row {}", row);
            continue;
        }

        let values = vectors.value(row);
        let values = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| LexiqError::Database("Invalid vector value type".to_string()))?;

        records.push(VectorRecord {
            position: positions.value(row),
            vector: values.values().to_vec(),
        });
    }

    Ok(records)
}
