use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;

/// Sampling parameters for a single completion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    #[inline]
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 512,
        }
    }
}

impl From<&RetrievalConfig> for GenerationParams {
    #[inline]
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Produces a text completion for a prompt
pub trait GenerationService {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> crate::Result<String>;
}
