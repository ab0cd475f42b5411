//! In-memory implementation of the storage traits.
//!
//! [`MemoryStore`] is a first-class backend for tests and ephemeral runs,
//! with identical semantics to the SQLite backend: upserts are
//! last-write-wins on the `(document_id, node_id, text_hash)` triple and
//! superseded rows are retained.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use semgraph_core::graph::SemanticGraph;
use semgraph_core::id::NodeId;

use crate::error::StorageError;
use crate::traits::{DocumentStore, EmbeddingCacheStore};
use crate::types::EmbeddingRecord;

/// A persisted graph together with its write metadata.
#[derive(Debug, Clone)]
pub struct PersistedGraph {
    pub graph: SemanticGraph,
    pub actor_id: String,
    pub reason: String,
}

type EmbeddingKey = (String, NodeId, String);

/// In-memory store for the embedding cache and persisted graphs.
#[derive(Default)]
pub struct MemoryStore {
    embeddings: Mutex<HashMap<EmbeddingKey, EmbeddingRecord>>,
    graphs: Mutex<HashMap<String, PersistedGraph>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Returns the last persisted graph for a document, if any. Test hook.
    pub fn persisted_graph(&self, document_id: &str) -> Option<PersistedGraph> {
        self.graphs
            .lock()
            .ok()
            .and_then(|graphs| graphs.get(document_id).cloned())
    }

    /// Total number of embedding cache rows across all documents. Test hook.
    pub fn embedding_row_count(&self) -> usize {
        self.embeddings.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    fn lock_embeddings(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<EmbeddingKey, EmbeddingRecord>>, StorageError> {
        self.embeddings.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl EmbeddingCacheStore for MemoryStore {
    fn fetch(
        &self,
        document_id: &str,
        node_ids: &[NodeId],
    ) -> Result<Vec<EmbeddingRecord>, StorageError> {
        let rows = self.lock_embeddings()?;
        let mut out = Vec::new();
        for node_id in node_ids {
            out.extend(
                rows.values()
                    .filter(|r| r.document_id == document_id && &r.node_id == node_id)
                    .cloned(),
            );
        }
        Ok(out)
    }

    fn upsert(&self, records: &[EmbeddingRecord]) -> Result<(), StorageError> {
        let mut rows = self.lock_embeddings()?;
        for record in records {
            let key = (
                record.document_id.clone(),
                record.node_id.clone(),
                record.text_hash.clone(),
            );
            rows.insert(key, record.clone());
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn persist_semantic_graph(
        &self,
        document_id: &str,
        graph: &SemanticGraph,
        actor_id: &str,
        reason: &str,
    ) -> Result<(), StorageError> {
        let mut graphs = self.graphs.lock().map_err(|_| StorageError::LockPoisoned)?;
        graphs.insert(
            document_id.to_string(),
            PersistedGraph {
                graph: graph.clone(),
                actor_id: actor_id.to_string(),
                reason: reason.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node: &str, hash: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            document_id: "doc-1".into(),
            node_id: NodeId(node.into()),
            text_hash: hash.into(),
            vector,
        }
    }

    #[test]
    fn upsert_fetch_matches_sqlite_semantics() {
        let store = MemoryStore::new();
        store.upsert(&[record("n1", "h1", vec![1.0])]).unwrap();
        store.upsert(&[record("n1", "h2", vec![2.0])]).unwrap();
        store.upsert(&[record("n1", "h1", vec![3.0])]).unwrap();

        let rows = store.fetch("doc-1", &[NodeId("n1".into())]).unwrap();
        assert_eq!(rows.len(), 2, "one row per distinct text hash");
        let h1 = rows.iter().find(|r| r.text_hash == "h1").unwrap();
        assert_eq!(h1.vector, vec![3.0], "same-key upsert is last-write-wins");
    }

    #[test]
    fn persist_overwrites_and_exposes_metadata() {
        let store = MemoryStore::new();
        let graph = SemanticGraph::new(vec![], vec![]);
        store
            .persist_semantic_graph("doc-1", &graph, "bootstrap", "initial")
            .unwrap();
        store
            .persist_semantic_graph("doc-1", &graph, "bootstrap", "re-run")
            .unwrap();

        let persisted = store.persisted_graph("doc-1").unwrap();
        assert_eq!(persisted.reason, "re-run");
        assert!(store.persisted_graph("doc-2").is_none());
    }
}
