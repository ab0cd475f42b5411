//! Shared application state.

use std::sync::Arc;

use semgraph_pipeline::chunker::ChunkConfig;
use semgraph_pipeline::{EmbeddingProvider, ExtractionProvider};
use semgraph_storage::{DocumentStore, EmbeddingCacheStore, MemoryStore, SqliteStore, StorageError};

use crate::job_store::JobStore;
use crate::llm_provider::{ModelConfig, OpenAiCompatClient};
use crate::runner::BootstrapRunner;

/// Shared application state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub job_store: Arc<JobStore>,
    pub runner: Arc<BootstrapRunner>,
    pub extraction: Arc<dyn ExtractionProvider>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub embedding_cache: Arc<dyn EmbeddingCacheStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub chunking: ChunkConfig,
    /// Present when a real model provider is configured; `None` in tests
    /// that inject mocks directly.
    pub llm: Option<ModelConfig>,
}

impl AppState {
    /// Production state: sqlite persistence plus an OpenAI-compatible
    /// client for both collaborator roles.
    pub fn new(db_path: &str, llm: ModelConfig) -> Result<Self, StorageError> {
        let store = Arc::new(SqliteStore::new(db_path)?);
        let client = Arc::new(OpenAiCompatClient::new(llm.clone()));
        Ok(AppState {
            job_store: Arc::new(JobStore::new()),
            runner: Arc::new(BootstrapRunner::new()),
            extraction: client.clone(),
            embeddings: client,
            embedding_cache: store.clone(),
            documents: store,
            chunking: ChunkConfig::default(),
            llm: Some(llm),
        })
    }

    /// Test state: in-memory storage and caller-supplied collaborators.
    /// Returns the store too so tests can inspect persisted rows.
    pub fn in_memory(
        extraction: Arc<dyn ExtractionProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            job_store: Arc::new(JobStore::new()),
            runner: Arc::new(BootstrapRunner::new()),
            extraction,
            embeddings,
            embedding_cache: store.clone(),
            documents: store.clone(),
            chunking: ChunkConfig::default(),
            llm: None,
        };
        (state, store)
    }

    /// The extraction provider for one job, honoring a per-request model
    /// override when a model provider is configured. Without a configured
    /// provider the override is ignored and the injected collaborator is
    /// used as-is.
    pub fn extraction_for_job(&self, model: Option<&str>) -> Arc<dyn ExtractionProvider> {
        match (model, &self.llm) {
            (Some(model), Some(llm)) => {
                Arc::new(OpenAiCompatClient::new(llm.clone().with_model(model)))
            }
            _ => self.extraction.clone(),
        }
    }
}
