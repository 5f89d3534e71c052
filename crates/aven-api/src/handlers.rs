//! Route handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use aven_knowledge::{FunctionCallReply, FunctionCallRequest, QueryResponse};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/knowledge-base - run one retrieval query.
pub async fn knowledge_base(
    State(state): State<AppState>,
    Json(body): Json<KnowledgeBaseRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let query = body
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query is required".to_string()))?;

    tracing::debug!(query = %query, "Knowledge base query");
    let result = state.knowledge.query(query).await?;
    let hits = result.ranked().into_iter().cloned().collect();
    Ok(Json(QueryResponse::ok(query, hits)))
}

/// POST /api/vapi-functions - voice assistant function-call webhook.
pub async fn vapi_functions(
    State(state): State<AppState>,
    Json(request): Json<FunctionCallRequest>,
) -> Json<FunctionCallReply> {
    if let Some(call) = &request.function {
        tracing::info!(function = %call.name, "Voice function call received");
    }
    Json(state.functions.handle_request(&request).await)
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
