//! Per-chunk mini graph extraction.
//!
//! Sends one collaborator call per chunk and evaluates the untrusted JSON
//! response into a tagged outcome: either a sanitized [`MiniGraph`] or a
//! structured rejection. Schema violations (missing fields, unknown node
//! type, out-of-range offsets) are hard failures; malformed output is never
//! coerced into partial data. Edge problems (unresolvable endpoints,
//! self-loops, duplicates, out-of-range weights) are sanitized instead,
//! because edges are derived data the model is allowed to get sloppy about.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::{json, Value};

use semgraph_core::block::{Block, BlockRef};
use semgraph_core::graph::{clamp_weight, clip_node_text, MiniEdge, MiniGraph, MiniNode, NodeType};
use semgraph_core::id::NodeId;

use crate::error::{PipelineError, SchemaIssue, SchemaRejection};
use crate::provider::ExtractionProvider;

const EXTRACTION_TEMPERATURE: f32 = 0.2;

/// Largest provenance offset the data model can represent. Anything above
/// this in a response is a schema violation, not a value to narrow.
const MAX_SPAN_OFFSET: i64 = u32::MAX as i64;

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract a typed knowledge graph from document content blocks.\n\
Return only JSON with no markdown and no surrounding text, shaped as:\n\
{\"nodes\": [{\"local_id\": string, \"block_id\": string, \"type\": one of \
goal|claim|evidence|definition|gap, \"text\": string, \"from\": optional \
character offset, \"to\": optional character offset}], \"edges\": \
[{\"from\": local_id, \"to\": local_id, \"weight\": number in [-1, 1]}]}.\n\
Rules:\n\
- local_id values are short and unique within this response.\n\
- block_id must be the id of the block the node was derived from.\n\
- Edges reference local_id values from this response only.\n\
- Keep node text under 280 characters.";

/// Tagged evaluation result for one extraction response.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Parsed(MiniGraph),
    Rejected(SchemaRejection),
}

#[derive(Debug, Deserialize)]
struct ExtractionEnvelope {
    nodes: Vec<RawExtractedNode>,
    #[serde(default)]
    edges: Vec<RawExtractedEdge>,
}

#[derive(Debug, Deserialize)]
struct RawExtractedNode {
    local_id: String,
    block_id: String,
    #[serde(rename = "type")]
    node_type: String,
    text: String,
    // i64 so negative offsets survive parsing and fail validation instead.
    #[serde(default)]
    from: Option<i64>,
    #[serde(default)]
    to: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawExtractedEdge {
    from: String,
    to: String,
    weight: f32,
}

/// Runs one extraction call for a chunk and returns its sanitized mini
/// graph. A rejected response is a hard failure that aborts the job.
pub async fn extract_mini_graph(
    provider: &dyn ExtractionProvider,
    chunk_id: &str,
    blocks: &[Block],
) -> Result<MiniGraph, PipelineError> {
    let payload = json!({
        "chunk_id": chunk_id,
        "blocks": blocks,
    });
    let raw = provider
        .extract(EXTRACTION_SYSTEM_PROMPT, &payload, EXTRACTION_TEMPERATURE)
        .await?;

    match evaluate_extraction_value(chunk_id, raw) {
        ExtractionOutcome::Parsed(graph) => {
            tracing::debug!(
                chunk_id,
                nodes = graph.nodes.len(),
                edges = graph.edges.len(),
                "chunk extraction parsed"
            );
            Ok(graph)
        }
        ExtractionOutcome::Rejected(rejection) => {
            Err(PipelineError::invalid("extraction", rejection))
        }
    }
}

/// Evaluates a raw extraction payload against the contract schema and
/// sanitizes it into a mini graph. Public for direct testing.
pub fn evaluate_extraction_value(chunk_id: &str, value: Value) -> ExtractionOutcome {
    let envelope: ExtractionEnvelope = match serde_json::from_value(value) {
        Ok(envelope) => envelope,
        Err(err) => {
            return ExtractionOutcome::Rejected(SchemaRejection::parse_failure(format!(
                "extraction JSON did not match contract schema: {err}"
            )));
        }
    };

    let issues = validate_envelope(&envelope);
    if !issues.is_empty() {
        return ExtractionOutcome::Rejected(SchemaRejection::invalid(issues));
    }

    ExtractionOutcome::Parsed(sanitize_envelope(chunk_id, envelope))
}

fn validate_envelope(envelope: &ExtractionEnvelope) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    for (i, node) in envelope.nodes.iter().enumerate() {
        let field = |name: &str| Some(format!("nodes[{i}].{name}"));
        if node.local_id.trim().is_empty() {
            issues.push(SchemaIssue::new(field("local_id"), "must not be empty"));
        }
        if node.block_id.trim().is_empty() {
            issues.push(SchemaIssue::new(field("block_id"), "must not be empty"));
        }
        if NodeType::parse(&node.node_type).is_none() {
            issues.push(SchemaIssue::new(
                field("type"),
                format!("unknown node type '{}'", node.node_type),
            ));
        }
        if node.text.trim().is_empty() {
            issues.push(SchemaIssue::new(field("text"), "must not be empty"));
        }
        if let Some(from) = node.from {
            if !(0..=MAX_SPAN_OFFSET).contains(&from) {
                issues.push(SchemaIssue::new(
                    field("from"),
                    format!("offset must be in [0, {MAX_SPAN_OFFSET}]"),
                ));
            }
        }
        if let Some(to) = node.to {
            if !(0..=MAX_SPAN_OFFSET).contains(&to) {
                issues.push(SchemaIssue::new(
                    field("to"),
                    format!("offset must be in [0, {MAX_SPAN_OFFSET}]"),
                ));
            }
        }
        if let (Some(from), Some(to)) = (node.from, node.to) {
            if from >= 0 && to >= 0 && to < from {
                issues.push(SchemaIssue::new(
                    field("to"),
                    "span end must not precede span start",
                ));
            }
        }
    }

    for (i, edge) in envelope.edges.iter().enumerate() {
        let field = |name: &str| Some(format!("edges[{i}].{name}"));
        if edge.from.trim().is_empty() {
            issues.push(SchemaIssue::new(field("from"), "must not be empty"));
        }
        if edge.to.trim().is_empty() {
            issues.push(SchemaIssue::new(field("to"), "must not be empty"));
        }
    }

    issues
}

/// Derives chunk-stable ids and applies edge sanitation. Assumes the
/// envelope already passed validation.
fn sanitize_envelope(chunk_id: &str, envelope: ExtractionEnvelope) -> MiniGraph {
    // Nodes: derived id, dedup by id. Last value wins: the id depends only
    // on position, so a repeated local_id is the model restating the same
    // node, not a distinct one.
    let mut order: Vec<NodeId> = Vec::new();
    let mut by_id: HashMap<NodeId, MiniNode> = HashMap::new();
    let mut local_ids: HashMap<String, NodeId> = HashMap::new();

    for raw in envelope.nodes {
        let id = NodeId::mini(chunk_id, &raw.local_id);
        // Validation guarantees the parse succeeds here.
        let Some(node_type) = NodeType::parse(&raw.node_type) else {
            continue;
        };
        let node = MiniNode {
            id: id.clone(),
            node_type,
            text: clip_node_text(&raw.text),
            provenance: vec![BlockRef::new(
                raw.block_id,
                raw.from.map(|v| v as u32),
                raw.to.map(|v| v as u32),
            )],
        };
        if by_id.insert(id.clone(), node).is_none() {
            order.push(id.clone());
        }
        local_ids.insert(raw.local_id, id);
    }

    // Edges: endpoints must resolve to local ids from this same response;
    // drop self-loops, dedup (from, to) first-wins, clamp weights.
    let mut seen_pairs: HashSet<(NodeId, NodeId)> = HashSet::new();
    let mut edges = Vec::new();
    for raw in envelope.edges {
        let (Some(from), Some(to)) = (local_ids.get(&raw.from), local_ids.get(&raw.to)) else {
            tracing::debug!(chunk_id, from = %raw.from, to = %raw.to, "dropping edge with unresolved endpoint");
            continue;
        };
        if from == to {
            continue;
        }
        if !seen_pairs.insert((from.clone(), to.clone())) {
            continue;
        }
        edges.push(MiniEdge {
            from: from.clone(),
            to: to.clone(),
            weight: clamp_weight(raw.weight),
        });
    }

    let nodes = order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect();

    MiniGraph { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(value: Value) -> MiniGraph {
        match evaluate_extraction_value("chunk-0", value) {
            ExtractionOutcome::Parsed(graph) => graph,
            ExtractionOutcome::Rejected(rejection) => {
                panic!("expected parsed outcome, got: {rejection:?}")
            }
        }
    }

    fn rejected(value: Value) -> SchemaRejection {
        match evaluate_extraction_value("chunk-0", value) {
            ExtractionOutcome::Rejected(rejection) => rejection,
            ExtractionOutcome::Parsed(graph) => {
                panic!("expected rejection, got graph: {graph:?}")
            }
        }
    }

    #[test]
    fn accepts_well_formed_response() {
        let graph = parsed(json!({
            "nodes": [
                {"local_id": "n1", "block_id": "b1", "type": "claim",
                 "text": "entropy never decreases", "from": 0, "to": 24},
                {"local_id": "n2", "block_id": "b2", "type": "evidence",
                 "text": "measured in the 1870s"}
            ],
            "edges": [
                {"from": "n2", "to": "n1", "weight": 0.8}
            ]
        }));
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.nodes[0].provenance[0].to, Some(24));
        assert_eq!(graph.edges[0].from, NodeId::mini("chunk-0", "n2"));
    }

    #[test]
    fn node_id_ignores_text_and_type() {
        let a = parsed(json!({
            "nodes": [{"local_id": "n1", "block_id": "b1", "type": "claim", "text": "wording one"}],
            "edges": []
        }));
        let b = parsed(json!({
            "nodes": [{"local_id": "n1", "block_id": "b1", "type": "gap", "text": "wording two"}],
            "edges": []
        }));
        assert_eq!(a.nodes[0].id, b.nodes[0].id);
    }

    #[test]
    fn repeated_local_id_collapses_to_one_node_last_value_wins() {
        let graph = parsed(json!({
            "nodes": [
                {"local_id": "n1", "block_id": "b1", "type": "claim", "text": "first wording"},
                {"local_id": "n1", "block_id": "b1", "type": "claim", "text": "second wording"}
            ],
            "edges": []
        }));
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].text, "second wording");
    }

    #[test]
    fn rejects_unknown_node_type() {
        let rejection = rejected(json!({
            "nodes": [{"local_id": "n1", "block_id": "b1", "type": "fact", "text": "t"}],
            "edges": []
        }));
        assert!(rejection
            .issues
            .iter()
            .any(|i| i.field.as_deref() == Some("nodes[0].type")));
    }

    #[test]
    fn rejects_negative_offsets_without_coercion() {
        let rejection = rejected(json!({
            "nodes": [{"local_id": "n1", "block_id": "b1", "type": "claim",
                       "text": "t", "from": -3, "to": 5}],
            "edges": []
        }));
        assert!(rejection
            .issues
            .iter()
            .any(|i| i.field.as_deref() == Some("nodes[0].from")));
    }

    #[test]
    fn rejects_offsets_beyond_span_range_without_wrapping() {
        // 2^32 would narrow to 0 if it ever reached the span constructor.
        let rejection = rejected(json!({
            "nodes": [{"local_id": "n1", "block_id": "b1", "type": "claim",
                       "text": "t", "from": 4_294_967_296i64, "to": 4_294_967_301i64}],
            "edges": []
        }));
        assert!(rejection
            .issues
            .iter()
            .any(|i| i.field.as_deref() == Some("nodes[0].from")));
        assert!(rejection
            .issues
            .iter()
            .any(|i| i.field.as_deref() == Some("nodes[0].to")));
    }

    #[test]
    fn accepts_offsets_at_the_span_range_boundary() {
        let graph = parsed(json!({
            "nodes": [{"local_id": "n1", "block_id": "b1", "type": "claim",
                       "text": "t", "from": 0, "to": u32::MAX}],
            "edges": []
        }));
        assert_eq!(graph.nodes[0].provenance[0].to, Some(u32::MAX));
    }

    #[test]
    fn rejects_missing_required_fields() {
        let rejection = rejected(json!({
            "nodes": [{"local_id": "n1", "type": "claim", "text": "t"}],
            "edges": []
        }));
        assert!(rejection.message.contains("did not match contract schema"));
    }

    #[test]
    fn rejects_non_object_payload() {
        let rejection = rejected(json!("not a graph"));
        assert!(rejection.issues.is_empty());
    }

    #[test]
    fn drops_edges_with_unknown_endpoints_self_loops_and_duplicates() {
        let graph = parsed(json!({
            "nodes": [
                {"local_id": "n1", "block_id": "b1", "type": "claim", "text": "a"},
                {"local_id": "n2", "block_id": "b1", "type": "claim", "text": "b"}
            ],
            "edges": [
                {"from": "n1", "to": "ghost", "weight": 0.5},
                {"from": "n1", "to": "n1", "weight": 0.5},
                {"from": "n1", "to": "n2", "weight": 0.5},
                {"from": "n1", "to": "n2", "weight": -0.9},
                {"from": "n2", "to": "n1", "weight": 12.0}
            ]
        }));
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].weight, 0.5, "first duplicate wins");
        assert_eq!(graph.edges[1].weight, 1.0, "weight clamped into [-1, 1]");
    }

    #[test]
    fn clips_overlong_node_text() {
        let long = "y".repeat(500);
        let graph = parsed(json!({
            "nodes": [{"local_id": "n1", "block_id": "b1", "type": "claim", "text": long}],
            "edges": []
        }));
        assert_eq!(graph.nodes[0].text.chars().count(), 280);
    }
}
