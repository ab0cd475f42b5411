//! Global canonicalization: one merge pass over all accumulated mini graphs.
//!
//! The collaborator sees every mini node and edge from every chunk in a
//! single call and proposes canonical groups (each with a `canonical_key`
//! and member mini-node ids) plus a canonical edge list keyed by those
//! keys. Canonical identity is `hash(type, canonical_key)`, so a stable key
//! across runs yields the same canonical id and re-canonicalization is
//! idempotent at the identity level.
//!
//! Mini nodes the merge response never references are dropped. That is the
//! model's latitude to discard near-duplicates, not a pipeline bug.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::{json, Value};

use semgraph_core::block::dedupe_provenance;
use semgraph_core::graph::{
    clamp_weight, clip_node_text, CanonicalEdge, CanonicalNode, MiniGraph, NodeType, SemanticGraph,
};
use semgraph_core::id::NodeId;

use crate::error::{PipelineError, SchemaIssue, SchemaRejection};
use crate::provider::ExtractionProvider;

const CANONICALIZE_TEMPERATURE: f32 = 0.1;

const CANONICALIZE_SYSTEM_PROMPT: &str = "\
You merge chunk-scoped knowledge graph fragments into one canonical graph.\n\
Return only JSON with no markdown and no surrounding text, shaped as:\n\
{\"groups\": [{\"canonical_key\": string, \"type\": one of \
goal|claim|evidence|definition|gap, \"text\": string, \"member_ids\": \
[mini node ids]}], \"edges\": [{\"from_key\": string, \"to_key\": string, \
\"weight\": number in [-1, 1]}]}.\n\
Rules:\n\
- Merge nodes that denote the same real-world concept into one group.\n\
- canonical_key is a short stable slug for the concept; reuse the same key \
for the same concept across runs.\n\
- Every group needs at least one member_id taken from the input nodes.\n\
- Edges reference canonical_key values declared in groups.\n\
- Keep node text under 280 characters.";

/// Tagged evaluation result for the merge response.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalizeOutcome {
    Parsed(SemanticGraph),
    Rejected(SchemaRejection),
}

#[derive(Debug, Deserialize)]
struct CanonicalizeEnvelope {
    groups: Vec<RawCanonicalGroup>,
    #[serde(default)]
    edges: Vec<RawCanonicalEdge>,
}

#[derive(Debug, Deserialize)]
struct RawCanonicalGroup {
    canonical_key: String,
    #[serde(rename = "type")]
    node_type: String,
    text: String,
    member_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCanonicalEdge {
    from_key: String,
    to_key: String,
    weight: f32,
}

/// Runs the global merge call and returns the canonical semantic graph.
pub async fn canonicalize(
    provider: &dyn ExtractionProvider,
    mini: &MiniGraph,
) -> Result<SemanticGraph, PipelineError> {
    let payload = json!({
        "nodes": mini.nodes,
        "edges": mini.edges,
    });
    let raw = provider
        .extract(CANONICALIZE_SYSTEM_PROMPT, &payload, CANONICALIZE_TEMPERATURE)
        .await?;

    match evaluate_canonicalize_value(mini, raw) {
        CanonicalizeOutcome::Parsed(graph) => {
            tracing::debug!(
                canonical_nodes = graph.nodes.len(),
                canonical_edges = graph.edges.len(),
                mini_nodes = mini.nodes.len(),
                "canonicalization parsed"
            );
            Ok(graph)
        }
        CanonicalizeOutcome::Rejected(rejection) => {
            Err(PipelineError::invalid("canonicalization", rejection))
        }
    }
}

/// Evaluates a raw merge payload against the contract schema and builds the
/// canonical graph. Public for direct testing.
pub fn evaluate_canonicalize_value(mini: &MiniGraph, value: Value) -> CanonicalizeOutcome {
    let envelope: CanonicalizeEnvelope = match serde_json::from_value(value) {
        Ok(envelope) => envelope,
        Err(err) => {
            return CanonicalizeOutcome::Rejected(SchemaRejection::parse_failure(format!(
                "canonicalization JSON did not match contract schema: {err}"
            )));
        }
    };

    let issues = validate_envelope(&envelope);
    if !issues.is_empty() {
        return CanonicalizeOutcome::Rejected(SchemaRejection::invalid(issues));
    }

    CanonicalizeOutcome::Parsed(build_graph(mini, envelope))
}

fn validate_envelope(envelope: &CanonicalizeEnvelope) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();
    let mut seen_identities: HashSet<(String, String)> = HashSet::new();

    for (i, group) in envelope.groups.iter().enumerate() {
        let field = |name: &str| Some(format!("groups[{i}].{name}"));
        if group.canonical_key.trim().is_empty() {
            issues.push(SchemaIssue::new(field("canonical_key"), "must not be empty"));
        }
        if NodeType::parse(&group.node_type).is_none() {
            issues.push(SchemaIssue::new(
                field("type"),
                format!("unknown node type '{}'", group.node_type),
            ));
        }
        if group.text.trim().is_empty() {
            issues.push(SchemaIssue::new(field("text"), "must not be empty"));
        }
        if group.member_ids.is_empty() {
            issues.push(SchemaIssue::new(
                field("member_ids"),
                "every canonical group needs at least one member",
            ));
        }
        // Two groups with the same (type, key) would collide to one id.
        if !seen_identities.insert((group.node_type.clone(), group.canonical_key.clone())) {
            issues.push(SchemaIssue::new(
                field("canonical_key"),
                format!(
                    "duplicate canonical identity ({}, {})",
                    group.node_type, group.canonical_key
                ),
            ));
        }
    }

    for (i, edge) in envelope.edges.iter().enumerate() {
        let field = |name: &str| Some(format!("edges[{i}].{name}"));
        if edge.from_key.trim().is_empty() {
            issues.push(SchemaIssue::new(field("from_key"), "must not be empty"));
        }
        if edge.to_key.trim().is_empty() {
            issues.push(SchemaIssue::new(field("to_key"), "must not be empty"));
        }
    }

    issues
}

/// Builds the canonical graph. Assumes the envelope passed validation.
fn build_graph(mini: &MiniGraph, envelope: CanonicalizeEnvelope) -> SemanticGraph {
    let mini_by_id: HashMap<&NodeId, &semgraph_core::graph::MiniNode> =
        mini.nodes.iter().map(|n| (&n.id, n)).collect();

    let mut key_to_id: HashMap<String, NodeId> = HashMap::new();
    let mut nodes = Vec::with_capacity(envelope.groups.len());

    for group in envelope.groups {
        let Some(node_type) = NodeType::parse(&group.node_type) else {
            continue;
        };
        let id = NodeId::canonical(node_type, &group.canonical_key);

        // Provenance union over all resolvable members; member ids the
        // accumulator never produced contribute nothing.
        let mut provenance = Vec::new();
        for member in &group.member_ids {
            if let Some(mini_node) = mini_by_id.get(&NodeId(member.clone())) {
                provenance.extend(mini_node.provenance.iter().cloned());
            } else {
                tracing::debug!(member, key = %group.canonical_key, "merge referenced unknown mini node id");
            }
        }

        key_to_id.insert(group.canonical_key, id.clone());
        nodes.push(CanonicalNode {
            id,
            node_type,
            text: clip_node_text(&group.text),
            provenance: dedupe_provenance(provenance),
        });
    }

    // Edge sanitation mirrors the per-chunk extractor: resolve keys, drop
    // unknowns and self-loops, dedup (from, to) first-wins, clamp weight.
    let mut seen_pairs: HashSet<(NodeId, NodeId)> = HashSet::new();
    let mut edges = Vec::new();
    for raw in envelope.edges {
        let (Some(from), Some(to)) = (key_to_id.get(&raw.from_key), key_to_id.get(&raw.to_key))
        else {
            tracing::debug!(from = %raw.from_key, to = %raw.to_key, "dropping canonical edge with undeclared key");
            continue;
        };
        if from == to {
            continue;
        }
        if !seen_pairs.insert((from.clone(), to.clone())) {
            continue;
        }
        edges.push(CanonicalEdge {
            from: from.clone(),
            to: to.clone(),
            weight: clamp_weight(raw.weight),
        });
    }

    SemanticGraph::new(nodes, edges)
}
