//! End-to-end integration tests for the bootstrap HTTP API.
//!
//! Tests exercise the full stack: HTTP request -> axum router -> handler ->
//! background pipeline -> storage -> polled HTTP response. Collaborators
//! are scripted mocks; the same mock serves both the per-chunk extraction
//! call and the global merge call, telling them apart by payload shape.
//!
//! Tests use `tower::ServiceExt::oneshot` to send requests directly to the
//! router without starting a network server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use semgraph_pipeline::chunker::ChunkConfig;
use semgraph_pipeline::{EmbeddingProvider, ExtractionProvider, ProviderError};
use semgraph_server::router::build_router;
use semgraph_server::state::AppState;
use semgraph_storage::MemoryStore;

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Deterministic text-model stand-in. Per-chunk calls (payload carries
/// `chunk_id`) yield one claim node per block with consecutive-block edges;
/// the merge call groups mini nodes by text, one canonical group each.
struct ScriptedCollaborator {
    /// Pause per extraction call so tests can observe intermediate stages.
    chunk_delay: Duration,
}

impl ScriptedCollaborator {
    fn new() -> Self {
        ScriptedCollaborator {
            chunk_delay: Duration::from_millis(100),
        }
    }

    fn extraction_response(payload: &Value) -> Value {
        let blocks = payload["blocks"].as_array().cloned().unwrap_or_default();
        let nodes: Vec<Value> = blocks
            .iter()
            .map(|b| {
                let id = b["id"].as_str().unwrap_or_default();
                json!({
                    "local_id": id,
                    "block_id": id,
                    "type": "claim",
                    "text": format!("claim from {id}"),
                })
            })
            .collect();
        let edges: Vec<Value> = blocks
            .windows(2)
            .map(|pair| {
                json!({
                    "from": pair[0]["id"],
                    "to": pair[1]["id"],
                    "weight": 0.5,
                })
            })
            .collect();
        json!({ "nodes": nodes, "edges": edges })
    }

    fn merge_response(payload: &Value) -> Value {
        let nodes = payload["nodes"].as_array().cloned().unwrap_or_default();

        // Group mini nodes by text. Key order follows first appearance.
        let mut keys: Vec<String> = Vec::new();
        let mut members: std::collections::HashMap<String, Vec<String>> =
            std::collections::HashMap::new();
        let mut key_of_id: std::collections::HashMap<String, String> =
            std::collections::HashMap::new();
        for node in &nodes {
            let text = node["text"].as_str().unwrap_or_default().to_string();
            let id = node["id"].as_str().unwrap_or_default().to_string();
            if !members.contains_key(&text) {
                keys.push(text.clone());
            }
            members.entry(text.clone()).or_default().push(id.clone());
            key_of_id.insert(id, text);
        }

        let groups: Vec<Value> = keys
            .iter()
            .map(|key| {
                json!({
                    "canonical_key": key,
                    "type": "claim",
                    "text": key,
                    "member_ids": members[key],
                })
            })
            .collect();

        let edges: Vec<Value> = payload["edges"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(|edge| {
                let from = key_of_id.get(edge["from"].as_str()?)?;
                let to = key_of_id.get(edge["to"].as_str()?)?;
                Some(json!({
                    "from_key": from,
                    "to_key": to,
                    "weight": edge["weight"],
                }))
            })
            .collect();

        json!({ "groups": groups, "edges": edges })
    }
}

#[async_trait]
impl ExtractionProvider for ScriptedCollaborator {
    async fn extract(
        &self,
        _system_prompt: &str,
        payload: &Value,
        _temperature: f32,
    ) -> Result<Value, ProviderError> {
        if payload.get("chunk_id").is_some() {
            tokio::time::sleep(self.chunk_delay).await;
            Ok(Self::extraction_response(payload))
        } else {
            Ok(Self::merge_response(payload))
        }
    }
}

/// Embedding stand-in returning a fixed two-dimensional vector per text.
struct FixedEmbedder;

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|_| vec![0.25, 0.5]).collect())
    }
}

/// Text model that returns unparseable output, failing every job.
struct BrokenCollaborator;

#[async_trait]
impl ExtractionProvider for BrokenCollaborator {
    async fn extract(
        &self,
        _system_prompt: &str,
        _payload: &Value,
        _temperature: f32,
    ) -> Result<Value, ProviderError> {
        Ok(json!("definitely not a graph"))
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Fresh app with scripted collaborators and small chunk budgets. The
/// returned store lets tests inspect persisted graphs and cache rows.
fn test_app() -> (Router, Arc<MemoryStore>) {
    app_with_extraction(Arc::new(ScriptedCollaborator::new()))
}

fn app_with_extraction(extraction: Arc<dyn ExtractionProvider>) -> (Router, Arc<MemoryStore>) {
    let (mut state, store) = AppState::in_memory(extraction, Arc::new(FixedEmbedder));
    // 40-char blocks cost ceil(40/4) + 8 = 18 tokens, so a budget of 80
    // packs exactly four blocks per chunk.
    state.chunking = ChunkConfig {
        target_token_budget: 80,
        overlap_token_budget: 0,
    };
    (build_router(state), store)
}

async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, request).await
}

async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(json!(null));
    (status, json)
}

/// Twelve 40-character blocks: three chunks of four under the test budget.
fn twelve_blocks() -> Vec<Value> {
    (0..12)
        .map(|i| {
            json!({
                "id": format!("b{i}"),
                "kind": "paragraph",
                "text": "x".repeat(40),
            })
        })
        .collect()
}

async fn start_job(app: &Router, document_id: &str) -> String {
    let (status, body) = post_json(
        app,
        "/semantic-graph/bootstrap",
        json!({ "document_id": document_id, "blocks": twelve_blocks() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "start failed: {body:?}");
    body["job_id"].as_str().unwrap().to_string()
}

/// Polls until the job reaches a terminal stage, collecting every observed
/// (stage, done_blocks) sample along the way.
async fn poll_to_terminal(app: &Router, job_id: &str) -> (Value, Vec<(String, u64)>) {
    let path = format!("/semantic-graph/jobs/{job_id}");
    let mut samples = Vec::new();
    for _ in 0..200 {
        let (status, body) = get_json(app, &path).await;
        assert_eq!(status, StatusCode::OK);
        let stage = body["stage"].as_str().unwrap().to_string();
        let done = body["done_blocks"].as_u64().unwrap();
        samples.push((stage.clone(), done));
        if stage == "done" || stage == "error" {
            return (body, samples);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {job_id} never reached a terminal stage");
}

fn stage_rank(stage: &str) -> u8 {
    match stage {
        "nodes" => 0,
        "edges" => 1,
        "persist" => 2,
        "done" => 3,
        "error" => 4,
        other => panic!("unknown stage {other}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bootstrap_runs_to_completion_with_final_counts() {
    let (app, store) = test_app();
    let job_id = start_job(&app, "doc-complete").await;

    let (body, _) = poll_to_terminal(&app, &job_id).await;
    assert_eq!(body["stage"], "done", "job failed: {body:?}");
    assert_eq!(body["done_blocks"], 12);
    assert_eq!(body["total_blocks"], 12);
    // 12 distinct block texts become 12 canonical nodes; three chunks of
    // four blocks yield three consecutive-pair edges each.
    assert_eq!(body["node_count"], 12);
    assert_eq!(body["edge_count"], 9);
    assert!(body.get("error").is_none());

    let persisted = store.persisted_graph("doc-complete").unwrap();
    assert_eq!(persisted.graph.nodes.len(), 12);
    assert_eq!(persisted.graph.edges.len(), 9);
    assert_eq!(persisted.actor_id, "semantic-graph-bootstrap");

    // One cache row per canonical node.
    assert_eq!(store.embedding_row_count(), 12);
}

#[tokio::test]
async fn status_is_pollable_immediately_after_start() {
    let (app, _) = test_app();
    let job_id = start_job(&app, "doc-early-poll").await;

    // The first extraction call sleeps, so this poll observes the job
    // before any progress was recorded.
    let (status, body) = get_json(&app, &format!("/semantic-graph/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "nodes");
    assert_eq!(body["done_blocks"], 0);
    assert_eq!(body["total_blocks"], 12);
    assert!(body.get("node_count").is_none());
}

#[tokio::test]
async fn observed_progress_is_monotonic() {
    let (app, _) = test_app();
    let job_id = start_job(&app, "doc-monotonic").await;

    let (body, samples) = poll_to_terminal(&app, &job_id).await;
    assert_eq!(body["stage"], "done");

    for pair in samples.windows(2) {
        let (ref prev_stage, prev_done) = pair[0];
        let (ref next_stage, next_done) = pair[1];
        assert!(
            stage_rank(next_stage) >= stage_rank(prev_stage),
            "stage regressed from {prev_stage} to {next_stage}"
        );
        assert!(
            next_done >= prev_done,
            "done_blocks regressed from {prev_done} to {next_done}"
        );
    }
}

#[tokio::test]
async fn malformed_collaborator_output_fails_the_job() {
    let (app, store) = app_with_extraction(Arc::new(BrokenCollaborator));
    let job_id = start_job(&app, "doc-broken").await;

    let (body, _) = poll_to_terminal(&app, &job_id).await;
    assert_eq!(body["stage"], "error");
    let message = body["error"].as_str().unwrap();
    assert!(
        message.contains("extraction"),
        "error should name the failing stage: {message}"
    );

    assert!(store.persisted_graph("doc-broken").is_none());
    assert_eq!(store.embedding_row_count(), 0);
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let (app, _) = test_app();
    let (status, body) = get_json(
        &app,
        "/semantic-graph/jobs/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_job_id_is_a_bad_request() {
    let (app, _) = test_app();
    let (status, body) = get_json(&app, "/semantic-graph/jobs/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn empty_block_list_is_rejected() {
    let (app, _) = test_app();
    let (status, body) = post_json(
        &app,
        "/semantic-graph/bootstrap",
        json!({ "document_id": "doc-empty", "blocks": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn blank_document_id_is_rejected() {
    let (app, _) = test_app();
    let (status, _) = post_json(
        &app,
        "/semantic-graph/bootstrap",
        json!({ "document_id": "  ", "blocks": twelve_blocks() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rerun_for_same_document_overwrites_the_graph() {
    let (app, store) = test_app();

    let first = start_job(&app, "doc-rerun").await;
    let (body, _) = poll_to_terminal(&app, &first).await;
    assert_eq!(body["stage"], "done");

    let second = start_job(&app, "doc-rerun").await;
    let (body, _) = poll_to_terminal(&app, &second).await;
    assert_eq!(body["stage"], "done");

    let persisted = store.persisted_graph("doc-rerun").unwrap();
    assert_eq!(persisted.graph.nodes.len(), 12);
    // Identical content produced identical canonical texts, so the second
    // run hit the embedding cache instead of adding rows.
    assert_eq!(store.embedding_row_count(), 12);

    // Both job records remain queryable.
    let (status, _) = get_json(&app, &format!("/semantic-graph/jobs/{first}")).await;
    assert_eq!(status, StatusCode::OK);
}
