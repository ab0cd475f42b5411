//! Content-addressed embedding cache fill for canonical nodes.
//!
//! A node's cache key is `(document_id, node_id, sha256(text))`. A cached
//! row counts as a hit only when its text hash matches the current text;
//! anything else (never seen, or text changed since last cached) is a
//! miss. All misses for one call go to the embedding collaborator in a
//! single batched request, and the results are upserted as new rows
//! (superseded rows stay behind; see DESIGN.md for the retention decision).

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use semgraph_core::graph::CanonicalNode;
use semgraph_core::id::NodeId;
use semgraph_storage::{EmbeddingCacheStore, EmbeddingRecord};

use crate::error::PipelineError;
use crate::provider::EmbeddingProvider;

/// Cache rows are fetched in groups of this size to stay under backend
/// query-size limits.
pub const FETCH_BATCH_SIZE: usize = 64;

/// Hex-encoded sha256 of node text, the content-address component of the
/// cache key.
pub fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Ensures every node has an embedding, returning vectors aligned to the
/// input order. Hits are served from the cache; all misses are embedded in
/// exactly one batched collaborator call, then cached.
pub async fn ensure_embeddings(
    store: &dyn EmbeddingCacheStore,
    provider: &dyn EmbeddingProvider,
    document_id: &str,
    nodes: &[CanonicalNode],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    let wanted: Vec<String> = nodes.iter().map(|n| text_hash(&n.text)).collect();

    // Fetch existing rows in bounded batches; index by (node_id, text_hash).
    let node_ids: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    let mut cached: HashMap<(NodeId, String), Vec<f32>> = HashMap::new();
    for batch in node_ids.chunks(FETCH_BATCH_SIZE) {
        for row in store.fetch(document_id, batch)? {
            cached.insert((row.node_id, row.text_hash), row.vector);
        }
    }

    let misses: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(i, node)| !cached.contains_key(&(node.id.clone(), wanted[*i].clone())))
        .map(|(i, _)| i)
        .collect();

    let mut fresh: HashMap<usize, Vec<f32>> = HashMap::new();
    if !misses.is_empty() {
        let texts: Vec<String> = misses.iter().map(|&i| nodes[i].text.clone()).collect();
        let vectors = provider.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(PipelineError::EmbeddingMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        let records: Vec<EmbeddingRecord> = misses
            .iter()
            .zip(vectors.iter())
            .map(|(&i, vector)| EmbeddingRecord {
                document_id: document_id.to_string(),
                node_id: nodes[i].id.clone(),
                text_hash: wanted[i].clone(),
                vector: vector.clone(),
            })
            .collect();
        store.upsert(&records)?;

        fresh.extend(misses.iter().copied().zip(vectors));
    }

    tracing::debug!(
        document_id,
        nodes = nodes.len(),
        misses = fresh.len(),
        "embedding cache fill complete"
    );

    // Assemble aligned output: fresh vectors for misses, cached for hits.
    // Hits are read without consuming so a node id appearing twice in the
    // input resolves both times.
    let mut out = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        let vector = match fresh.remove(&i) {
            Some(vector) => vector,
            None => cached
                .get(&(node.id.clone(), wanted[i].clone()))
                .cloned()
                // Every index is either a miss (fresh) or a hit (cached).
                .unwrap_or_default(),
        };
        out.push(vector);
    }
    Ok(out)
}
