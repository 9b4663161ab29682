//! # Gatewayエンドポイント
//!
//! - `POST /api/upload` — 画像アップロード + ジョブ作成
//! - `GET /api/status/{job_id}` — 進捗取得
//! - `GET /api/download/{job_id}` — 結果画像の取得
//! - `GET /health` — 死活監視

use std::sync::Arc;

use axum::routing::{get, post};

use crate::config::GatewayState;

pub mod download;
pub mod health;
pub mod status;
pub mod upload;

pub use download::handle_download;
pub use health::handle_health;
pub use status::handle_status;
pub use upload::handle_upload;

/// Gatewayのルーターを構築する。
pub fn router(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new()
        .route("/api/upload", post(handle_upload))
        .route("/api/status/{job_id}", get(handle_status))
        .route("/api/download/{job_id}", get(handle_download))
        .route("/health", get(handle_health))
        .with_state(state)
}
