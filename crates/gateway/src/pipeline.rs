//! # 変換パイプライン定義
//!
//! 鉛筆画をペン入れ画像に変換する固定の2ステージパイプライン
//! （`INPUT_INITIALIZE` → `DIFFUSION`）を構築する。

use pencil2ink_crypto::md5_hex;
use pencil2ink_types::{
    CreateJobRequest, Diffusion, InputInitialize, JobStage, LoraItem, LoraSet, Prompt, StageType,
};

/// ペン入れ用スタイルアダプタ（LoRA）
pub const INKIFY_LORA_ID: &str = "920889236046011951";
/// ベースモデル（flux1-dev-kontext_fp8_scaled）
pub const BASE_MODEL_ID: &str = "879112449935019302";
pub const INKIFY_LORA_WEIGHT: f64 = 0.80;

pub const SEED: u64 = 1300163161;
pub const PROMPT: &str =
    "inkify, convert pencils to clean black ink, fill X-marked regions solid black, remove paper texture";
pub const NEGATIVE_PROMPT: &str = "color image, watercolor, blur, noise, pencil lines, grey";

const SD_VAE: &str = "Automatic";
const SAMPLER: &str = "Euler";
const STEPS: u32 = 20;
const CFG_SCALE: u32 = 2;
const GUIDANCE: f64 = 3.5;
const DENOISING_STRENGTH: f64 = 0.5;
const CLIP_SKIP: u32 = 2;

/// ジョブ作成リクエストの `request_id` を生成する。
///
/// 形式はmd5の16進32文字のまま、入力にUUIDを混ぜて同一秒内の衝突を避ける。
pub fn new_request_id(timestamp: u64) -> String {
    md5_hex(format!("{timestamp}:{}", uuid::Uuid::new_v4()).as_bytes())
}

/// アップロード済みリソースから変換ジョブのリクエストを構築する。
pub fn build_job_request(
    request_id: String,
    resource_id: &str,
    width: u32,
    height: u32,
) -> CreateJobRequest {
    CreateJobRequest {
        request_id,
        stages: vec![
            JobStage {
                stage_type: StageType::InputInitialize,
                input_initialize: Some(InputInitialize {
                    seed: SEED,
                    image_resource_id: resource_id.to_string(),
                    count: 1,
                }),
                diffusion: None,
            },
            JobStage {
                stage_type: StageType::Diffusion,
                input_initialize: None,
                diffusion: Some(Diffusion {
                    width,
                    height,
                    prompts: vec![Prompt {
                        text: PROMPT.to_string(),
                    }],
                    negative_prompts: vec![Prompt {
                        text: NEGATIVE_PROMPT.to_string(),
                    }],
                    sd_model: BASE_MODEL_ID.to_string(),
                    sd_vae: SD_VAE.to_string(),
                    sampler: SAMPLER.to_string(),
                    steps: STEPS,
                    cfg_scale: CFG_SCALE,
                    guidance: GUIDANCE,
                    denoising_strength: DENOISING_STRENGTH,
                    clip_skip: CLIP_SKIP,
                    lora: LoraSet {
                        items: vec![LoraItem {
                            lora_model: INKIFY_LORA_ID.to_string(),
                            weight: INKIFY_LORA_WEIGHT,
                        }],
                    },
                }),
            },
        ],
    }
}
