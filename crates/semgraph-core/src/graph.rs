//! Mini (chunk-scoped) and canonical (document-scoped) semantic graphs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::BlockRef;
use crate::id::NodeId;

/// Schema version written into every persisted [`SemanticGraph`].
pub const SEMANTIC_GRAPH_VERSION: u32 = 1;

/// Upper bound on node text length, in characters. Longer model output is
/// clipped, not rejected.
pub const MAX_NODE_TEXT_CHARS: usize = 280;

/// The typed vocabulary of semantic graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Goal,
    Claim,
    Evidence,
    Definition,
    Gap,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Goal => "goal",
            NodeType::Claim => "claim",
            NodeType::Evidence => "evidence",
            NodeType::Definition => "definition",
            NodeType::Gap => "gap",
        }
    }

    /// Parses the wire form. Returns `None` for anything outside the enum;
    /// callers treat that as a schema violation, never coercing.
    pub fn parse(s: &str) -> Option<NodeType> {
        match s {
            "goal" => Some(NodeType::Goal),
            "claim" => Some(NodeType::Claim),
            "evidence" => Some(NodeType::Evidence),
            "definition" => Some(NodeType::Definition),
            "gap" => Some(NodeType::Gap),
            _ => None,
        }
    }
}

/// Clips node text to [`MAX_NODE_TEXT_CHARS`] characters.
pub fn clip_node_text(text: &str) -> String {
    if text.chars().count() <= MAX_NODE_TEXT_CHARS {
        text.to_string()
    } else {
        text.chars().take(MAX_NODE_TEXT_CHARS).collect()
    }
}

/// Clamps an edge weight into `[-1, 1]`.
pub fn clamp_weight(weight: f32) -> f32 {
    weight.clamp(-1.0, 1.0)
}

/// A chunk-scoped node produced by one extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub text: String,
    pub provenance: Vec<BlockRef>,
}

/// A directed edge between mini nodes from the same extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: f32,
}

/// The accumulated per-chunk extraction result prior to canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiniGraph {
    pub nodes: Vec<MiniNode>,
    pub edges: Vec<MiniEdge>,
}

impl MiniGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Appends another mini graph (one chunk's output) to this accumulator.
    pub fn absorb(&mut self, other: MiniGraph) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }
}

/// A deduplicated, document-scoped node after the global merge pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub text: String,
    pub provenance: Vec<BlockRef>,
}

/// A directed edge between canonical nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: f32,
}

/// The persisted artifact: the whole-document semantic graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticGraph {
    pub version: u32,
    pub nodes: Vec<CanonicalNode>,
    pub edges: Vec<CanonicalEdge>,
    pub updated_at: DateTime<Utc>,
}

impl SemanticGraph {
    pub fn new(nodes: Vec<CanonicalNode>, edges: Vec<CanonicalEdge>) -> Self {
        SemanticGraph {
            version: SEMANTIC_GRAPH_VERSION,
            nodes,
            edges,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_wire_form_is_lowercase() {
        let json = serde_json::to_string(&NodeType::Definition).unwrap();
        assert_eq!(json, "\"definition\"");
        let back: NodeType = serde_json::from_str("\"gap\"").unwrap();
        assert_eq!(back, NodeType::Gap);
    }

    #[test]
    fn node_type_parse_rejects_unknown_values() {
        assert_eq!(NodeType::parse("claim"), Some(NodeType::Claim));
        assert_eq!(NodeType::parse("Claim"), None);
        assert_eq!(NodeType::parse("fact"), None);
    }

    #[test]
    fn clip_node_text_is_char_based() {
        let short = "short enough";
        assert_eq!(clip_node_text(short), short);

        let long: String = "é".repeat(MAX_NODE_TEXT_CHARS + 40);
        let clipped = clip_node_text(&long);
        assert_eq!(clipped.chars().count(), MAX_NODE_TEXT_CHARS);
    }

    #[test]
    fn clamp_weight_bounds() {
        assert_eq!(clamp_weight(3.5), 1.0);
        assert_eq!(clamp_weight(-2.0), -1.0);
        assert_eq!(clamp_weight(0.25), 0.25);
    }

    #[test]
    fn absorb_accumulates_in_order() {
        let mut acc = MiniGraph::default();
        let a = MiniNode {
            id: crate::id::NodeId::mini("chunk-0", "n1"),
            node_type: NodeType::Claim,
            text: "first".into(),
            provenance: vec![],
        };
        let b = MiniNode {
            id: crate::id::NodeId::mini("chunk-1", "n1"),
            node_type: NodeType::Claim,
            text: "second".into(),
            provenance: vec![],
        };
        acc.absorb(MiniGraph {
            nodes: vec![a.clone()],
            edges: vec![],
        });
        acc.absorb(MiniGraph {
            nodes: vec![b.clone()],
            edges: vec![],
        });
        assert_eq!(acc.nodes, vec![a, b]);
    }

    #[test]
    fn semantic_graph_carries_schema_version() {
        let graph = SemanticGraph::new(vec![], vec![]);
        assert_eq!(graph.version, SEMANTIC_GRAPH_VERSION);
    }
}
