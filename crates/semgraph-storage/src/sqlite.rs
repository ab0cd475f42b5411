//! SQLite implementation of the storage traits.
//!
//! [`SqliteStore`] keeps the connection behind a `std::sync::Mutex` because
//! `rusqlite::Connection` is `!Sync` and the store is shared by concurrent
//! bootstrap jobs. Vectors and graphs are stored as JSON TEXT columns via
//! serde_json. Every multi-row write runs inside a transaction.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection};

use semgraph_core::graph::SemanticGraph;
use semgraph_core::id::NodeId;

use crate::error::StorageError;
use crate::traits::{DocumentStore, EmbeddingCacheStore};
use crate::types::EmbeddingRecord;

/// SQLite-backed store for the embedding cache and persisted graphs.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let mut conn = Connection::open(path)?;
        crate::schema::prepare(&mut conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let mut conn = Connection::open_in_memory()?;
        crate::schema::prepare(&mut conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl EmbeddingCacheStore for SqliteStore {
    fn fetch(
        &self,
        document_id: &str,
        node_ids: &[NodeId],
    ) -> Result<Vec<EmbeddingRecord>, StorageError> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;

        // ?1 is the document id; the IN list starts at ?2.
        let placeholders = (0..node_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT document_id, node_id, text_hash, vector_json \
             FROM embedding_cache \
             WHERE document_id = ?1 AND node_id IN ({placeholders})"
        );

        let mut values: Vec<String> = Vec::with_capacity(node_ids.len() + 1);
        values.push(document_id.to_string());
        values.extend(node_ids.iter().map(|id| id.0.clone()));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (document_id, node_id, text_hash, vector_json) = row?;
            let vector: Vec<f32> = serde_json::from_str(&vector_json)?;
            records.push(EmbeddingRecord {
                document_id,
                node_id: NodeId(node_id),
                text_hash,
                vector,
            });
        }
        Ok(records)
    }

    fn upsert(&self, records: &[EmbeddingRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO embedding_cache (document_id, node_id, text_hash, vector_json) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT (document_id, node_id, text_hash) \
                 DO UPDATE SET vector_json = excluded.vector_json",
            )?;
            for record in records {
                let vector_json = serde_json::to_string(&record.vector)?;
                stmt.execute(params![
                    record.document_id,
                    record.node_id.0,
                    record.text_hash,
                    vector_json,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn persist_semantic_graph(
        &self,
        document_id: &str,
        graph: &SemanticGraph,
        actor_id: &str,
        reason: &str,
    ) -> Result<(), StorageError> {
        let graph_json = serde_json::to_string(graph)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO semantic_graphs (document_id, graph_json, actor_id, reason, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (document_id) \
             DO UPDATE SET graph_json = excluded.graph_json, \
                           actor_id = excluded.actor_id, \
                           reason = excluded.reason, \
                           updated_at = excluded.updated_at",
            params![
                document_id,
                graph_json,
                actor_id,
                reason,
                graph.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
