//! Retrieval-augmented question answering over ingested documents
//!
//! [`Engine`] owns the live index and coordinates the two pipelines:
//!
//! * ingestion: extract, chunk, embed, then append to the index and persist
//!   the new generation as one guarded commit;
//! * query: retrieve the closest chunks, build the prompt and ask the model.
//!
//! Ingestion is serialized. Queries read the index concurrently and see it
//! either before or after any given commit.


use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigError, CorruptIndexPolicy};
use crate::embeddings::{ChunkingError, Embedder, EmbeddingError, TextSplitter, build_embedder};
use crate::extractor::{ExtractionError, FileExtractor, TextExtractor, extension_of};
use crate::generation::{
    ChatMessage, GenerationClient, GenerationError, NO_INFORMATION_RESPONSE, OllamaChatClient,
    PromptBuilder, PromptOutcome, generate_with_retry,
};
use crate::index::{
    Chunk, IndexError, IndexState, IndexStore, LoadError, SaveError, SourceSummary,
};
use crate::retrieval::{RetrievalError, RetrievalResult, Retriever, SharedIndex};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid chunking settings: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Failed to load the persisted index: {0}")]
    Load(#[from] LoadError),

    #[error(
        "Persisted index has dimension {persisted} but the embedder produces {configured}; \
         re-ingest or restore the matching embedding settings"
    )]
    DimensionMismatch { persisted: usize, configured: usize },

    #[error("Embedder reports a vector dimension of zero")]
    ZeroDimension,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("No text found in '{0}'")]
    EmptyDocument(String),

    #[error("Failed to embed chunks: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Failed to add chunks to the index: {0}")]
    Index(#[from] IndexError),

    #[error("Failed to persist the index: {0}")]
    Save(#[from] SaveError),

    #[error("Ingestion task failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Error searching your documents: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// How the persisted index was found when the engine started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupState {
    /// Nothing persisted yet
    Fresh,
    /// A committed index was loaded
    Loaded { chunks: usize },
    /// The persisted index was unreadable and was replaced by an empty one
    Recovered { path: PathBuf, reason: String },
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub chunks: usize,
    pub total_chunks: usize,
}

/// Answer text and the chunks it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub sources: Vec<RetrievalResult>,
}

impl QueryResponse {
    fn message(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            sources: Vec::new(),
        }
    }
}

/// Builds an [`Engine`], optionally with substitute collaborators
pub struct EngineBuilder {
    config: Config,
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn GenerationClient>>,
    extractor: Option<Arc<dyn TextExtractor>>,
}

impl EngineBuilder {
    #[inline]
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[inline]
    pub fn generator(mut self, generator: Arc<dyn GenerationClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[inline]
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Validate the configuration and load (or create) the index
    #[inline]
    pub fn build(self) -> Result<Engine, EngineError> {
        let config = self.config;
        config.validate()?;

        let splitter = TextSplitter::new(&config.chunking)?;
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => build_embedder(&config)?,
        };
        let generator: Arc<dyn GenerationClient> = match self.generator {
            Some(generator) => generator,
            None => Arc::new(OllamaChatClient::new(&config)?),
        };
        let extractor: Arc<dyn TextExtractor> = match self.extractor {
            Some(extractor) => extractor,
            None => Arc::new(FileExtractor::new()),
        };

        let dimension = embedder.dimension();
        if dimension == 0 {
            return Err(EngineError::ZeroDimension);
        }

        let store = IndexStore::new(config.index_dir());
        let (state, startup) = open_index(&store, dimension, config.storage.on_corrupt)?;
        let state: SharedIndex = Arc::new(RwLock::new(state));

        Ok(Engine {
            splitter,
            retriever: Retriever::new(Arc::clone(&embedder), Arc::clone(&state)),
            embedder,
            generator,
            extractor,
            store,
            state,
            prompts: PromptBuilder::new(config.retrieval.history_window),
            top_k: config.retrieval.top_k,
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            ingest_lock: Mutex::new(()),
            startup,
        })
    }
}

fn open_index(
    store: &IndexStore,
    dimension: usize,
    on_corrupt: CorruptIndexPolicy,
) -> Result<(IndexState, StartupState), EngineError> {
    match store.load() {
        Ok(persisted) => {
            if persisted.index.dimension() != dimension {
                return Err(EngineError::DimensionMismatch {
                    persisted: persisted.index.dimension(),
                    configured: dimension,
                });
            }
            let chunks = persisted.index.count();
            Ok((
                IndexState::from_persisted(persisted),
                StartupState::Loaded { chunks },
            ))
        }
        Err(LoadError::NotFound(dir)) => {
            info!("No index found in {}, starting empty", dir.display());
            Ok((IndexState::new(dimension), StartupState::Fresh))
        }
        Err(LoadError::Corrupt { path, reason }) => match on_corrupt {
            CorruptIndexPolicy::Reset => {
                warn!(
                    "Index artifact {} is corrupt ({}); starting with an empty index",
                    path.display(),
                    reason
                );
                Ok((
                    IndexState::new(dimension),
                    StartupState::Recovered { path, reason },
                ))
            }
            CorruptIndexPolicy::Fail => {
                error!("Index artifact {} is corrupt: {}", path.display(), reason);
                Err(LoadError::Corrupt { path, reason }.into())
            }
        },
        Err(e) => {
            error!("Cannot open index: {}", e);
            Err(e.into())
        }
    }
}

/// The RAG service object; share it behind an `Arc`
pub struct Engine {
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn GenerationClient>,
    extractor: Arc<dyn TextExtractor>,
    store: IndexStore,
    state: SharedIndex,
    retriever: Retriever,
    prompts: PromptBuilder,
    top_k: usize,
    generation_timeout: Duration,
    ingest_lock: Mutex<()>,
    startup: StartupState,
}

impl Engine {
    /// Engine with the collaborators selected by `config`
    #[inline]
    pub fn init(config: Config) -> Result<Self, EngineError> {
        Self::builder(config).build()
    }

    #[inline]
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder {
            config,
            embedder: None,
            generator: None,
            extractor: None,
        }
    }

    #[inline]
    pub fn startup_state(&self) -> &StartupState {
        &self.startup
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn index_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Number of indexed chunks
    #[inline]
    pub async fn count(&self) -> usize {
        self.state.read().await.count()
    }

    /// Indexed sources with their chunk counts
    #[inline]
    pub async fn sources(&self) -> Vec<SourceSummary> {
        self.state.read().await.metadata().sources()
    }

    /// Ingest a file, returning the number of chunks added
    ///
    /// Every failure is logged and reported as zero chunks; the index is
    /// left exactly as it was.
    #[inline]
    pub async fn ingest(&self, file_path: &Path, display_name: &str) -> usize {
        match self.try_ingest(file_path, display_name).await {
            Ok(report) => report.chunks,
            Err(e) => {
                warn!("Could not ingest '{}': {}", display_name, e);
                0
            }
        }
    }

    /// Ingest a file, reporting why nothing was added
    ///
    /// The format comes from the extension of `display_name`, which is also
    /// the source name recorded on every chunk.
    #[inline]
    pub async fn try_ingest(
        &self,
        file_path: &Path,
        display_name: &str,
    ) -> Result<IngestReport, IngestError> {
        let _serialized = self.ingest_lock.lock().await;

        let extractor = Arc::clone(&self.extractor);
        let path = file_path.to_path_buf();
        let extension = extension_of(display_name);
        let text =
            tokio::task::spawn_blocking(move || extractor.extract_text(&path, &extension))
                .await??;

        if text.trim().is_empty() {
            return Err(IngestError::EmptyDocument(display_name.to_string()));
        }

        let pieces = self.splitter.split_text(&text);
        if pieces.is_empty() {
            return Err(IngestError::EmptyDocument(display_name.to_string()));
        }
        debug!("Split '{}' into {} chunks", display_name, pieces.len());

        let embedder = Arc::clone(&self.embedder);
        let (pieces, vectors) = tokio::task::spawn_blocking(move || {
            embedder.encode(&pieces).map(|vectors| (pieces, vectors))
        })
        .await??;

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .map(|text| Chunk::new(text, display_name))
            .collect();
        let added = chunks.len();

        let mut state = self.state.write().await;
        let checkpoint = state.count();
        state.append(&vectors, chunks)?;

        if let Err(e) = self.store.save(state.index(), state.metadata()) {
            state.truncate(checkpoint);
            error!(
                "Failed to persist index after ingesting '{}', rolled back to {} chunks: {}",
                display_name, checkpoint, e
            );
            return Err(e.into());
        }

        let total_chunks = state.count();
        info!(
            "Indexed {} chunks from '{}' ({} total)",
            added, display_name, total_chunks
        );

        Ok(IngestReport {
            source: display_name.to_string(),
            chunks: added,
            total_chunks,
        })
    }

    /// Answer `question`; failures become a readable response with no sources
    #[inline]
    pub async fn query(
        &self,
        question: &str,
        history: &[ChatMessage],
        strict: bool,
    ) -> QueryResponse {
        self.query_with_cancel(question, history, strict, &CancellationToken::new())
            .await
    }

    /// [`Engine::query`] that stops waiting for the model once `cancel` fires
    #[inline]
    pub async fn query_with_cancel(
        &self,
        question: &str,
        history: &[ChatMessage],
        strict: bool,
        cancel: &CancellationToken,
    ) -> QueryResponse {
        match self.try_query(question, history, strict, cancel).await {
            Ok(response) => response,
            Err(e) => {
                error!("Query failed: {}", e);
                QueryResponse::message(e.to_string())
            }
        }
    }

    #[inline]
    pub async fn try_query(
        &self,
        question: &str,
        history: &[ChatMessage],
        strict: bool,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse, QueryError> {
        let results = self.retriever.retrieve(question, self.top_k).await?;

        let request = match self.prompts.build(question, &results, history, strict) {
            PromptOutcome::NoContext => {
                debug!("Strict query with no retrieved context, not calling the model");
                return Ok(QueryResponse::message(NO_INFORMATION_RESPONSE));
            }
            PromptOutcome::Request(request) => request,
        };

        let response = generate_with_retry(
            self.generator.as_ref(),
            &request,
            self.generation_timeout,
            cancel,
        )
        .await?;

        Ok(QueryResponse {
            response,
            sources: results,
        })
    }
}
