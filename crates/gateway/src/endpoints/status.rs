//! # GET /api/status/{job_id}

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use pencil2ink_types::StatusResponse;

use crate::config::GatewayState;
use crate::error::RelayError;

/// GET /api/status/{job_id} — ジョブの進捗を返す。
pub async fn handle_status(
    State(state): State<Arc<GatewayState>>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, RelayError> {
    let progress = state.relay.get_status(&job_id).await?;
    Ok(Json(progress.into()))
}
