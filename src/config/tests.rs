use super::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn config_file_persistence() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config_path = temp_dir.path().join("config.toml");

    let original_config = Config {
        ollama: OllamaConfig {
            protocol: "https".to_string(),
            host: "test-host".to_string(),
            port: 8080,
            embedding_model: "test-embed".to_string(),
            generation_model: "test-chat".to_string(),
            batch_size: 32,
            timeout_seconds: 60,
            retry_attempts: 2,
        },
        retrieval: RetrievalConfig {
            top_k: 7,
            temperature: 0.0,
            max_output_tokens: 256,
        },
        storage: StorageConfig::default(),
        base_dir: std::path::PathBuf::new(),
    };

    let toml_content = toml::to_string_pretty(&original_config)
        .expect("config should convert to toml string successfully");
    fs::write(&config_path, toml_content).expect("should write to config_path successfully");

    let content =
        fs::read_to_string(&config_path).expect("should read from config_path successfully");
    let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

    assert_eq!(original_config, loaded_config);
}

#[test]
fn invalid_toml_handling() {
    let invalid_toml = r#"
        [ollama
        host = "localhost"
        port = "invalid_port"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}

#[test]
#[serial]
fn home_env_var_overrides_config_dir() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");

    // SAFETY: serialized with the other tests touching the environment
    unsafe {
        std::env::set_var(settings::HOME_ENV_VAR, temp_dir.path());
    }
    let dir = get_config_dir().expect("should resolve config dir");
    // SAFETY: see above
    unsafe {
        std::env::remove_var(settings::HOME_ENV_VAR);
    }

    assert_eq!(dir, temp_dir.path());
}

#[test]
#[serial]
fn config_dir_falls_back_to_platform_dir() {
    // SAFETY: serialized with the other tests touching the environment
    unsafe {
        std::env::remove_var(settings::HOME_ENV_VAR);
    }

    if let Ok(dir) = get_config_dir() {
        assert!(dir.ends_with("lexiq"));
    }
}

#[test]
fn config_error_converts_to_crate_error() {
    let err: crate::LexiqError = ConfigError::InvalidTopK(0).into();
    assert!(matches!(err, crate::LexiqError::Config(_)));
    assert!(err.to_string().contains("top_k"));
}
