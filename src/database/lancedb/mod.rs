// LanceDB vector database module
// Stores clause vectors keyed by their index position

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::VectorStore;

/// Name of the table holding clause vectors
pub const VECTOR_TABLE: &str = "vectors";

/// Vector row stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Position of the clause this vector belongs to
    pub position: u64,
    pub vector: Vec<f32>,
}
