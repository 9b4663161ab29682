//! # Gateway エラー型
//!
//! リレーの全操作が返すタグ付きエラー。ルート層では
//! `{"status": "error", "message": ...}` 形式のJSONに変換する。
//! メッセージはフロントエンドにそのまま表示されるため英語で返す。

use axum::http::StatusCode;
use axum::Json;
use pencil2ink_crypto::SigningError;
use pencil2ink_types::ErrorResponse;

/// リレーエラー型。
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// 入力画像が不正（サイズ・形式・解像度）
    #[error("{0}")]
    InvalidImage(String),
    /// 内部ジョブIDが未発行、または期限切れで削除済み
    #[error("Job not found")]
    NotFound,
    /// プロバイダまたはストレージが非成功ステータスを返した。
    /// `body` には診断用に上流のレスポンスボディをそのまま保持する。
    #[error("{context}: {body}")]
    Upstream {
        context: String,
        status: Option<u16>,
        body: String,
    },
    /// プロバイダがFAILEDを報告
    #[error("Job processing failed")]
    JobFailed,
    /// SUCCESS前にダウンロードが要求された
    #[error("Image not ready yet")]
    NotReady,
    /// プロバイダのレスポンスに期待するフィールドがない
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
    /// 秘密鍵のパースまたは署名に失敗
    #[error("Request signing failed: {0}")]
    Signing(#[from] SigningError),
    /// 内部エラー（シリアライズ失敗等）
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// 上流の非成功レスポンスからエラーを構築する。
    pub(crate) fn upstream(context: &str, status: Option<u16>, body: impl Into<String>) -> Self {
        RelayError::Upstream {
            context: context.to_string(),
            status,
            body: body.into(),
        }
    }

    /// 送受信自体の失敗から上流エラーを構築する。
    ///
    /// reqwestのエラー文字列には事前署名URLが含まれるため、URLを除いてログに残し、
    /// クライアントに返すボディは空にする。
    pub(crate) fn transport(context: &str, status: Option<u16>, err: reqwest::Error) -> Self {
        tracing::warn!(context = %context, error = %err.without_url(), "上流との通信に失敗");
        Self::upstream(context, status, "")
    }
}

impl axum::response::IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            RelayError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            RelayError::NotFound => StatusCode::NOT_FOUND,
            RelayError::Upstream { .. } | RelayError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::JobFailed => StatusCode::UNPROCESSABLE_ENTITY,
            RelayError::NotReady => StatusCode::CONFLICT,
            RelayError::Signing(_) | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // 鍵関連の詳細はクライアントに返さない
        let message = match &self {
            RelayError::Signing(e) => {
                tracing::error!(error = %e, "リクエスト署名に失敗");
                "Request signing failed".to_string()
            }
            RelayError::Upstream {
                context, status, ..
            } => {
                tracing::warn!(context = %context, upstream_status = ?status, "上流がエラーを返しました");
                self.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
