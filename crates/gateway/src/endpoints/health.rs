//! # GET /health

use axum::Json;
use pencil2ink_types::HealthResponse;

/// GET /health — 死活監視。
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
