// Embeddings module
// Text to vector conversion, backed by an Ollama server

pub mod ollama;

pub use ollama::{ModelDetails, ModelInfo, OllamaClient};

/// Converts text into a fixed-length vector.
///
/// Every vector produced by one service must share the same dimension.
pub trait EmbeddingService {
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>>;

    /// Embed several texts, preserving their order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
