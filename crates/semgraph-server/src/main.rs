//! Binary entrypoint for the semantic graph server.
//!
//! Reads configuration from environment variables:
//! - `SEMGRAPH_DB_PATH`: SQLite database file path (default: "semgraph.db")
//! - `SEMGRAPH_PORT`: Server listen port (default: "3000")
//! - `SEMGRAPH_LLM_PROVIDER`: "openrouter" or "openai_compatible"
//!   (default: "openrouter")
//! - `SEMGRAPH_LLM_BASE_URL`: API base URL (required for openai_compatible)
//! - `SEMGRAPH_LLM_API_KEY`: API key for the model provider
//! - `SEMGRAPH_LLM_MODEL`: chat model for extraction and canonicalization
//! - `SEMGRAPH_EMBEDDING_MODEL`: model for the embeddings endpoint
//! - `SEMGRAPH_CHUNK_TOKENS` / `SEMGRAPH_OVERLAP_TOKENS`: chunk budget
//!   overrides (defaults 1000 / 120)

use semgraph_server::llm_provider::ModelConfig;
use semgraph_server::router::build_router;
use semgraph_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_path = std::env::var("SEMGRAPH_DB_PATH")
        .unwrap_or_else(|_| "semgraph.db".to_string());
    let port = std::env::var("SEMGRAPH_PORT")
        .unwrap_or_else(|_| "3000".to_string());

    let llm = ModelConfig {
        provider: std::env::var("SEMGRAPH_LLM_PROVIDER")
            .unwrap_or_else(|_| "openrouter".to_string()),
        api_base_url: std::env::var("SEMGRAPH_LLM_BASE_URL").ok(),
        api_key: std::env::var("SEMGRAPH_LLM_API_KEY").ok(),
        model: std::env::var("SEMGRAPH_LLM_MODEL")
            .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
        embedding_model: std::env::var("SEMGRAPH_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "openai/text-embedding-3-small".to_string()),
    };

    let mut state = AppState::new(&db_path, llm)
        .expect("Failed to initialize application state");
    if let Some(target) = env_u64("SEMGRAPH_CHUNK_TOKENS") {
        state.chunking.target_token_budget = target;
    }
    if let Some(overlap) = env_u64("SEMGRAPH_OVERLAP_TOKENS") {
        state.chunking.overlap_token_budget = overlap;
    }

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("semgraph server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
