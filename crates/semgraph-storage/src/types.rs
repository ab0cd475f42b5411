//! Storage-level record types.

use serde::{Deserialize, Serialize};

use semgraph_core::id::NodeId;

/// One content-addressed embedding cache row.
///
/// Keyed by `(document_id, node_id, text_hash)`. A new text hash for the
/// same `(document_id, node_id)` produces a new row; superseded rows are
/// retained (retention policy is an open decision, see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub document_id: String,
    pub node_id: NodeId,
    /// Hex-encoded sha256 of the node text at embedding time.
    pub text_hash: String,
    pub vector: Vec<f32>,
}
