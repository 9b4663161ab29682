//! # Pencil2Ink Gateway
//!
//! 鉛筆画をインク画に変換するフロントエンドとTAMS画像生成APIの間に立つGateway。
//!
//! ## 役割
//! - アップロード画像の検証
//! - TAMS APIへのRSA署名付きリクエスト中継
//! - 内部ジョブIDとTAMSジョブIDの対応管理（1時間で期限切れ）
//! - ジョブ状態の正規化と結果画像のダウンロード中継
//!
//! ## API エンドポイント
//! - `POST /api/upload` — 画像アップロード + 変換ジョブ作成
//! - `GET /api/status/{job_id}` — 進捗取得
//! - `GET /api/download/{job_id}` — 結果画像の取得
//! - `GET /health` — 死活監視

mod auth;
mod config;
mod endpoints;
mod error;
mod pipeline;
mod registry;
mod relay;
mod validate;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::auth::TamsClient;
use crate::config::{GatewayConfig, GatewayState};
use crate::registry::JobRegistry;
use crate::relay::Relay;
use crate::validate::ImageLimits;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 必須変数の欠落・不正な鍵はここで起動失敗とする
    let config = GatewayConfig::from_env()?;
    tracing::info!(tams_url = %config.tams_url, app_id = %config.app_id, "設定を読み込みました");

    let tams = TamsClient::new(&config, reqwest::Client::new());
    let registry = Arc::new(JobRegistry::new());
    let state = Arc::new(GatewayState {
        relay: Relay::new(tams, registry, config.transfer_timeout),
        image_limits: ImageLimits::default(),
    });

    let app = endpoints::router(state);

    tracing::info!("Gatewayを {} で起動します", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
