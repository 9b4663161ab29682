//! # POST /api/upload
//!
//! 鉛筆画のアップロードと変換ジョブの作成。

use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use pencil2ink_types::UploadResponse;

use crate::config::GatewayState;
use crate::error::RelayError;
use crate::validate::{validate_image, FILE_TOO_LARGE};

/// 画像を受け取るmultipartフィールド名
pub const FILE_FIELD: &str = "file";

/// POST /api/upload — 画像を検証してTAMSに投入し、内部ジョブIDを返す。
pub async fn handle_upload(
    State(state): State<Arc<GatewayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, RelayError> {
    let mut multipart = multipart
        .map_err(|e| RelayError::InvalidImage(format!("Invalid upload: {}", e.body_text())))?;

    let mut file_bytes = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            file_bytes = Some(bytes);
            break;
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| RelayError::InvalidImage("No file uploaded".to_string()))?;

    let dimensions = validate_image(&file_bytes, &state.image_limits)?;
    tracing::debug!(
        width = dimensions.width,
        height = dimensions.height,
        size = file_bytes.len(),
        "アップロード画像を受理しました"
    );

    let job_id = state
        .relay
        .submit_job(file_bytes.to_vec(), dimensions.width, dimensions.height)
        .await?;

    Ok(Json(UploadResponse::success(job_id)))
}

/// multipartの読み取りエラーを変換する。
///
/// ボディ上限を超えた場合はバリデータと同じサイズ超過メッセージを返す。
fn multipart_error(err: MultipartError) -> RelayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::InvalidImage(FILE_TOO_LARGE.to_string())
    } else {
        RelayError::InvalidImage(format!("Invalid upload: {}", err.body_text()))
    }
}
