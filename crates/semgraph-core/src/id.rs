//! Deterministic content-derived node identity using blake3.
//!
//! Node ids are never random: a mini node's id depends only on its
//! `(chunk_id, local_id)` position, and a canonical node's id only on its
//! `(type, canonical_key)`. Repeated extraction or canonicalization runs
//! that produce the same positions/keys therefore collide to the same ids,
//! which is what makes re-bootstrap idempotent at the identity level.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::NodeType;

/// Length of the hex-encoded id prefix kept from the blake3 digest.
const ID_HEX_LEN: usize = 32;

/// Stable node identifier, shared by mini and canonical nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Derives a chunk-scoped mini node id from `(chunk_id, local_id)`.
    ///
    /// The hash deliberately excludes node type and text: two extraction
    /// calls that name the same local id in the same chunk must collide
    /// even when the model's wording differs.
    pub fn mini(chunk_id: &str, local_id: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(chunk_id.as_bytes());
        // Separator byte so ("ab", "c") and ("a", "bc") hash differently.
        hasher.update(&[0u8]);
        hasher.update(local_id.as_bytes());
        NodeId(hasher.finalize().to_hex()[..ID_HEX_LEN].to_string())
    }

    /// Derives a canonical node id from `(type, canonical_key)`.
    pub fn canonical(node_type: NodeType, canonical_key: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(node_type.as_str().as_bytes());
        hasher.update(&[0u8]);
        hasher.update(canonical_key.as_bytes());
        NodeId(hasher.finalize().to_hex()[..ID_HEX_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mini_id_depends_only_on_chunk_and_local_id() {
        let a = NodeId::mini("chunk-0", "n1");
        let b = NodeId::mini("chunk-0", "n1");
        assert_eq!(a, b, "same position must produce the same id");

        assert_ne!(NodeId::mini("chunk-0", "n1"), NodeId::mini("chunk-0", "n2"));
        assert_ne!(NodeId::mini("chunk-0", "n1"), NodeId::mini("chunk-1", "n1"));
    }

    #[test]
    fn mini_id_separator_prevents_concatenation_collisions() {
        assert_ne!(NodeId::mini("ab", "c"), NodeId::mini("a", "bc"));
    }

    #[test]
    fn canonical_id_is_stable_for_same_type_and_key() {
        let a = NodeId::canonical(NodeType::Claim, "entropy-bound");
        let b = NodeId::canonical(NodeType::Claim, "entropy-bound");
        assert_eq!(a, b);

        assert_ne!(a, NodeId::canonical(NodeType::Evidence, "entropy-bound"));
        assert_ne!(a, NodeId::canonical(NodeType::Claim, "entropy-bound-2"));
    }

    #[test]
    fn ids_are_fixed_length_hex() {
        let id = NodeId::mini("chunk-3", "n7");
        assert_eq!(id.as_str().len(), ID_HEX_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn serde_roundtrip() {
        let id = NodeId::canonical(NodeType::Goal, "main-thesis");
        let json = serde_json::to_string(&id).unwrap();
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
