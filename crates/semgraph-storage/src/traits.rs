//! Storage contracts for the embedding cache and document persistence.
//!
//! Both traits take `&self` so a single store instance can be shared by
//! concurrently running bootstrap jobs; backends provide their own interior
//! locking. Upserts are last-write-wins at the key level, which is safe for
//! the embedding cache because concurrent writers for the same
//! `(document_id, node_id, text_hash)` triple compute the same vector
//! modulo model nondeterminism.

use semgraph_core::graph::SemanticGraph;
use semgraph_core::id::NodeId;

use crate::error::StorageError;
use crate::types::EmbeddingRecord;

/// Content-addressed embedding cache.
pub trait EmbeddingCacheStore: Send + Sync {
    /// Returns all cached rows for the given `(document_id, node_id)` pairs,
    /// any text hash. Callers decide hit vs. stale by comparing hashes.
    fn fetch(
        &self,
        document_id: &str,
        node_ids: &[NodeId],
    ) -> Result<Vec<EmbeddingRecord>, StorageError>;

    /// Inserts or replaces rows keyed by `(document_id, node_id, text_hash)`.
    fn upsert(&self, records: &[EmbeddingRecord]) -> Result<(), StorageError>;
}

/// Document-side persistence boundary for the finished semantic graph.
///
/// The pipeline does not interpret the storage format beyond "succeeds or
/// errors". Concurrent persists for the same document are last-writer-wins.
pub trait DocumentStore: Send + Sync {
    fn persist_semantic_graph(
        &self,
        document_id: &str,
        graph: &SemanticGraph,
        actor_id: &str,
        reason: &str,
    ) -> Result<(), StorageError>;
}
