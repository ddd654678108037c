use thiserror::Error;

pub type Result<T> = std::result::Result<T, DockError>;

#[derive(Error, Debug)]
pub enum DockError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] extractor::ExtractionError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] embeddings::EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Index load error: {0}")]
    Load(#[from] index::persistence::LoadError),

    #[error("Index save error: {0}")]
    Save(#[from] index::persistence::SaveError),

    #[error("Generation error: {0}")]
    Generation(#[from] generation::GenerationError),

    #[error("Engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod ollama;
pub mod retrieval;
