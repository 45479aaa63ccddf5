#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use lexiq::config::Config;
use lexiq::embeddings::{EmbeddingService, OllamaClient};
use lexiq::generation::{GenerationParams, GenerationService};
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn create_integration_test_client() -> OllamaClient {
    let mut config = Config::default();
    config.ollama.host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    config.ollama.port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    if let Ok(model) = env::var("OLLAMA_EMBEDDING_MODEL") {
        config.ollama.embedding_model = model;
    }
    if let Ok(model) = env::var("OLLAMA_GENERATION_MODEL") {
        config.ollama.generation_model = model;
    }
    config.ollama.batch_size = 5;

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_embeddings_share_dimension() {
    init_test_tracing();

    let client = create_integration_test_client();
    let single = client
        .embed("The cure period is thirty days.")
        .expect("single embedding should succeed");
    assert!(!single.is_empty());

    let texts: Vec<String> = (0..7)
        .map(|i| format!("Clause {} of the master services agreement", i))
        .collect();
    let batch = client
        .embed_batch(&texts)
        .expect("batch embedding should succeed");

    info!("Embedding dimension: {}", single.len());
    assert_eq!(batch.len(), texts.len());
    assert!(batch.iter().all(|vector| vector.len() == single.len()));
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_similar_texts_are_closer() {
    init_test_tracing();

    let client = create_integration_test_client();
    let distance = |a: &[f32], b: &[f32]| -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    };

    let query = client
        .embed("How long is the cure period for a breach?")
        .expect("should embed query");
    let related = client
        .embed("Cure period is 30 days after written notice of breach.")
        .expect("should embed related clause");
    let unrelated = client
        .embed("The office kitchen is cleaned every Friday.")
        .expect("should embed unrelated clause");

    assert!(distance(&query, &related) < distance(&query, &unrelated));
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_generates_text() {
    init_test_tracing();

    let client = create_integration_test_client();
    let params = GenerationParams {
        temperature: 0.0,
        max_output_tokens: 32,
    };

    let answer = client
        .generate("Reply with the single word: ready", &params)
        .expect("generation should succeed");

    info!("Generated: {}", answer);
    assert!(!answer.trim().is_empty());
}
