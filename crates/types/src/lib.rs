//! # Pencil2Ink 共有型定義
//!
//! TAMS API（画像生成プロバイダ）とのワイヤフォーマット、および
//! クライアント向けAPIのレスポンスボディをRust構造体として提供する。
//!
//! ## キー命名規則
//! TAMS APIはcamelCaseとsnake_caseが混在している（例: `negativePrompts` と `sd_model`）。
//! 署名対象のボディはシリアライズ結果そのものなので、キー名とフィールド順は
//! プロバイダの期待する形から変えてはならない。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// リソース（アップロード枠）
// ---------------------------------------------------------------------------

/// `POST /v1/resource/image` のリクエストボディ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceRequest {
    /// 署名付きアップロードURLの有効期限（秒）
    #[serde(rename = "expireSec")]
    pub expire_sec: u64,
}

/// `POST /v1/resource/image` のレスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceResponse {
    /// プロバイダが割り当てたリソースID
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    /// 画像をPUTする署名付きURL
    #[serde(rename = "putUrl")]
    pub put_url: String,
    /// PUT時に付与すべきヘッダ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

// ---------------------------------------------------------------------------
// ジョブ作成
// ---------------------------------------------------------------------------

/// `POST /v1/jobs` のリクエストボディ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    /// リクエスト識別子（32文字の小文字16進）
    pub request_id: String,
    /// パイプラインのステージ列
    pub stages: Vec<JobStage>,
}

/// パイプラインのステージ種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    /// 入力画像の初期化
    InputInitialize,
    /// 拡散モデルによる生成
    Diffusion,
}

/// パイプラインの1ステージ。`stage_type` に対応するフィールドのみ設定する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStage {
    #[serde(rename = "type")]
    pub stage_type: StageType,
    #[serde(
        rename = "inputInitialize",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_initialize: Option<InputInitialize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffusion: Option<Diffusion>,
}

/// `INPUT_INITIALIZE` ステージのパラメータ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInitialize {
    pub seed: u64,
    pub image_resource_id: String,
    pub count: u32,
}

/// `DIFFUSION` ステージのパラメータ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diffusion {
    pub width: u32,
    pub height: u32,
    pub prompts: Vec<Prompt>,
    #[serde(rename = "negativePrompts")]
    pub negative_prompts: Vec<Prompt>,
    /// ベースモデルID
    pub sd_model: String,
    #[serde(rename = "sdVae")]
    pub sd_vae: String,
    pub sampler: String,
    pub steps: u32,
    pub cfg_scale: u32,
    pub guidance: f64,
    #[serde(rename = "denoisingStrength")]
    pub denoising_strength: f64,
    pub clip_skip: u32,
    pub lora: LoraSet,
}

/// プロンプト1件。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
}

/// スタイルアダプタ（LoRA）の集合。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraSet {
    pub items: Vec<LoraItem>,
}

/// スタイルアダプタ1件と適用重み。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraItem {
    #[serde(rename = "loraModel")]
    pub lora_model: String,
    pub weight: f64,
}

// ---------------------------------------------------------------------------
// ジョブ取得
// ---------------------------------------------------------------------------

/// `POST /v1/jobs` と `GET /v1/jobs/{id}` に共通のレスポンス外殻。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job: Job,
}

/// プロバイダ側のジョブ。
///
/// プロバイダのステートマシンは不透明なので、状態は生の文字列のまま保持する。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "waitingInfo", default, skip_serializing_if = "Option::is_none")]
    pub waiting_info: Option<WaitingInfo>,
    #[serde(rename = "runningInfo", default, skip_serializing_if = "Option::is_none")]
    pub running_info: Option<RunningInfo>,
    #[serde(rename = "successInfo", default, skip_serializing_if = "Option::is_none")]
    pub success_info: Option<SuccessInfo>,
    #[serde(rename = "failInfo", default, skip_serializing_if = "Option::is_none")]
    pub fail_info: Option<FailInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitingInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunningInfo {
    /// 進捗率。小数で返ることがある。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuccessInfo {
    #[serde(default)]
    pub images: Vec<OutputImage>,
}

/// 生成結果の画像1枚。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// クライアント向けAPI
// ---------------------------------------------------------------------------

/// 正規化されたジョブ進捗。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// プロバイダが返した生のステータス
    pub job_status: String,
    /// 0〜100
    pub progress: u8,
    /// 表示用メッセージ
    pub message: String,
}

/// `POST /api/upload` の成功レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub job_id: String,
}

impl UploadResponse {
    pub fn success(job_id: String) -> Self {
        Self {
            status: "success".to_string(),
            job_id,
        }
    }
}

/// `GET /api/status/{job_id}` の成功レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub job_status: String,
    pub progress: u8,
    pub message: String,
}

impl From<JobProgress> for StatusResponse {
    fn from(p: JobProgress) -> Self {
        Self {
            status: "success".to_string(),
            job_status: p.job_status,
            progress: p.progress,
            message: p.message,
        }
    }
}

/// 全エンドポイント共通のエラーレスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// `GET /health` のレスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
