//! # GET /api/download/{job_id}
//!
//! 変換結果のPNGを添付ファイルとして返す。

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::config::GatewayState;
use crate::error::RelayError;

const CONTENT_DISPOSITION: &str = "attachment; filename=\"inked_image.png\"";

/// GET /api/download/{job_id} — 結果画像のバイナリを返す。
pub async fn handle_download(
    State(state): State<Arc<GatewayState>>,
    Path(job_id): Path<String>,
) -> Result<Response, RelayError> {
    let result = state.relay.download_result(&job_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, result.media_type),
            (header::CONTENT_DISPOSITION, CONTENT_DISPOSITION),
        ],
        result.bytes,
    )
        .into_response())
}
