// Configuration management module
// TOML settings for the Ollama backend, chunking, retrieval and storage

pub mod settings;

pub use settings::{
    Config, ConfigError, CorruptIndexPolicy, EmbeddingConfig, EmbeddingProvider,
    GenerationConfig, OllamaConfig, RetrievalConfig, StorageConfig,
};

/// Get the default data directory path
#[inline]
pub fn get_data_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
