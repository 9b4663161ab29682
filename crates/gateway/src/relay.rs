//! # TAMSリレー
//!
//! クライアントからの3つの操作（ジョブ投入・状態取得・結果取得）を
//! TAMS APIへの呼び出し列に変換する。
//!
//! ## ジョブ投入の流れ
//! 1. 期限切れジョブの回収
//! 2. `POST /v1/resource/image` — アップロード枠の取得（署名付き）
//! 3. `PUT putUrl` — 画像本体のアップロード（署名なし、事前署名URL）
//! 4. `POST /v1/jobs` — 変換ジョブの作成（署名付き）
//! 5. レジストリに登録して内部IDを返す
//!
//! どの段階でも上流が失敗した時点で中断し、リトライはしない。
//! レジストリへの登録はジョブ作成の成功後にのみ行う。

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use pencil2ink_types::{
    CreateResourceRequest, CreateResourceResponse, Job, JobEnvelope, JobProgress,
};

use crate::auth::TamsClient;
use crate::error::RelayError;
use crate::pipeline::{build_job_request, new_request_id};
use crate::registry::JobRegistry;

pub const RESOURCE_PATH: &str = "/v1/resource/image";
pub const JOBS_PATH: &str = "/v1/jobs";

/// アップロード枠の有効期限（秒）
pub const UPLOAD_EXPIRE_SECS: u64 = 3600;

/// 結果画像のメディアタイプ
pub const RESULT_MEDIA_TYPE: &str = "image/png";

/// ダウンロードした変換結果。
#[derive(Debug, Clone)]
pub struct ResultImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

/// TAMSリレー。レジストリは外部から注入する。
pub struct Relay {
    tams: TamsClient,
    registry: Arc<JobRegistry>,
    transfer_timeout: Duration,
}

impl Relay {
    pub fn new(tams: TamsClient, registry: Arc<JobRegistry>, transfer_timeout: Duration) -> Self {
        Self {
            tams,
            registry,
            transfer_timeout,
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// 画像をアップロードして変換ジョブを作成し、内部ジョブIDを返す。
    pub async fn submit_job(
        &self,
        image: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<String, RelayError> {
        let removed = self.registry.sweep().await;
        if removed > 0 {
            let remaining = self.registry.len().await;
            tracing::info!(removed, remaining, "期限切れジョブを削除しました");
        }

        // Step 1: アップロード枠の取得
        let context = "Failed to get upload URL";
        let resource_body = to_json(&CreateResourceRequest {
            expire_sec: UPLOAD_EXPIRE_SECS,
        })?;
        let response = self
            .tams
            .send_signed(Method::POST, RESOURCE_PATH, &resource_body, context)
            .await?;
        if response.status != StatusCode::OK {
            return Err(RelayError::upstream(
                context,
                Some(response.status.as_u16()),
                response.body,
            ));
        }
        let resource: CreateResourceResponse = parse_json(&response.body, "resource")?;

        // Step 2: 事前署名URLへの画像アップロード
        self.put_image(&resource, image).await?;

        // Step 3: 変換ジョブの作成
        let context = "Failed to create job";
        let timestamp = pencil2ink_crypto::tams::unix_seconds()?;
        let job_request = build_job_request(
            new_request_id(timestamp),
            &resource.resource_id,
            width,
            height,
        );
        let job_body = to_json(&job_request)?;
        let response = self
            .tams
            .send_signed(Method::POST, JOBS_PATH, &job_body, context)
            .await?;
        if response.status != StatusCode::OK {
            return Err(RelayError::upstream(
                context,
                Some(response.status.as_u16()),
                response.body,
            ));
        }
        let envelope: JobEnvelope = parse_json(&response.body, "job")?;
        if envelope.job.id.is_empty() {
            return Err(RelayError::MalformedResponse(
                "job.id is missing".to_string(),
            ));
        }

        // Step 4: 内部IDの発行
        let internal_id = self.registry.create(&envelope.job.id).await;
        tracing::info!(
            job_id = %internal_id,
            provider_job_id = %envelope.job.id,
            resource_id = %resource.resource_id,
            request_id = %job_request.request_id,
            "変換ジョブを作成しました"
        );

        Ok(internal_id)
    }

    /// ジョブの進捗を取得する。
    pub async fn get_status(&self, internal_id: &str) -> Result<JobProgress, RelayError> {
        let provider_job_id = self.registry.lookup(internal_id).await?;
        let job = self.fetch_job(&provider_job_id).await?;
        normalize_status(&job)
    }

    /// 完了したジョブの結果画像を取得する。
    pub async fn download_result(&self, internal_id: &str) -> Result<ResultImage, RelayError> {
        let provider_job_id = self.registry.lookup(internal_id).await?;
        let job = self.fetch_job(&provider_job_id).await?;

        match job.status.as_deref() {
            Some("SUCCESS") => {}
            Some("FAILED") => return Err(RelayError::JobFailed),
            _ => return Err(RelayError::NotReady),
        }

        let url = job
            .success_info
            .as_ref()
            .and_then(|info| info.images.first())
            .and_then(|image| image.url.as_deref())
            .ok_or_else(|| RelayError::MalformedResponse("No image found in job result".to_string()))?;

        let context = "Failed to download image";
        let response = self
            .tams
            .http_client()
            .get(url)
            .timeout(self.transfer_timeout)
            .send()
            .await
            .map_err(|e| RelayError::transport(context, None, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::upstream(context, Some(status.as_u16()), body));
        }

        let bytes = response.bytes()
            .await
            .map_err(|e| RelayError::transport(context, Some(status.as_u16()), e))?;

        tracing::info!(job_id = %internal_id, size = bytes.len(), "変換結果を取得しました");

        Ok(ResultImage {
            bytes: bytes.to_vec(),
            media_type: RESULT_MEDIA_TYPE,
        })
    }

    /// `GET /v1/jobs/{id}` を署名付きで呼び出す。
    async fn fetch_job(&self, provider_job_id: &str) -> Result<Job, RelayError> {
        let context = "Failed to get job status";
        let path = format!("{JOBS_PATH}/{provider_job_id}");
        let response = self
            .tams
            .send_signed(Method::GET, &path, "", context)
            .await?;
        if response.status != StatusCode::OK {
            return Err(RelayError::upstream(
                context,
                Some(response.status.as_u16()),
                response.body,
            ));
        }
        let envelope: JobEnvelope = parse_json(&response.body, "job")?;
        Ok(envelope.job)
    }

    /// 事前署名URLへ画像をPUTする。200と204を成功とみなす。
    async fn put_image(
        &self,
        resource: &CreateResourceResponse,
        image: Vec<u8>,
    ) -> Result<(), RelayError> {
        let context = "Failed to upload image";

        let mut headers = HeaderMap::new();
        for (name, value) in resource.headers.iter().flatten() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                RelayError::MalformedResponse(format!("invalid upload header name {name}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                RelayError::MalformedResponse(format!("invalid upload header value: {e}"))
            })?;
            headers.insert(name, value);
        }

        let response = self
            .tams
            .http_client()
            .put(&resource.put_url)
            .timeout(self.transfer_timeout)
            .headers(headers)
            .body(image)
            .send()
            .await
            .map_err(|e| RelayError::transport(context, None, e))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::upstream(context, Some(status.as_u16()), body));
        }
        Ok(())
    }
}

/// プロバイダのジョブ状態を `{status, progress, message}` に正規化する。
pub fn normalize_status(job: &Job) -> Result<JobProgress, RelayError> {
    let status = job
        .status
        .clone()
        .ok_or_else(|| RelayError::MalformedResponse("job.status is missing".to_string()))?;

    let (progress, message) = match status.as_str() {
        "SUBMITTED" | "PENDING" => (0, "Initializing...".to_string()),
        "WAITING" => (
            10,
            job.waiting_info
                .as_ref()
                .and_then(|info| info.message.clone())
                .unwrap_or_else(|| "Waiting...".to_string()),
        ),
        "RUNNING" => (
            job.running_info
                .as_ref()
                .and_then(|info| info.progress)
                .map(clamp_progress)
                .unwrap_or(50),
            "Processing...".to_string(),
        ),
        "SUCCESS" => (100, "Completed!".to_string()),
        "FAILED" => (
            0,
            job.fail_info
                .as_ref()
                .and_then(|info| info.message.clone())
                .unwrap_or_else(|| "Processing failed".to_string()),
        ),
        other => (0, format!("Status: {other}")),
    };

    Ok(JobProgress {
        job_status: status,
        progress,
        message,
    })
}

fn clamp_progress(progress: f64) -> u8 {
    if progress.is_nan() {
        return 0;
    }
    progress.round().clamp(0.0, 100.0) as u8
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RelayError> {
    serde_json::to_string(value)
        .map_err(|e| RelayError::Internal(format!("リクエストのシリアライズに失敗: {e}")))
}

fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, RelayError> {
    serde_json::from_str(body)
        .map_err(|e| RelayError::MalformedResponse(format!("unexpected {what} response: {e}")))
}

#[cfg(test)]
mod tests;
