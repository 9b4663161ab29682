//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。

use std::time::Duration;

use crate::relay::Relay;
use crate::validate::ImageLimits;

/// 必須の環境変数
pub const REQUIRED_VARS: [&str; 3] = ["TAMS_URL", "TAMS_APP_ID", "PRIVATE_KEY_PEM"];

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 60;

/// Gatewayの起動設定。
#[derive(Clone)]
pub struct GatewayConfig {
    /// TAMS APIのベースURL（末尾の `/` は除去済み）
    pub tams_url: String,
    /// TAMSアプリケーションID
    pub app_id: String,
    /// PEM形式のRSA秘密鍵
    pub private_key_pem: String,
    pub bind_addr: String,
    /// 署名付きAPI呼び出しのタイムアウト
    pub api_timeout: Duration,
    /// 画像アップロード・結果取得のタイムアウト
    pub transfer_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("tams_url", &self.tams_url)
            .field("app_id", &self.app_id)
            .field("private_key_pem", &"<redacted>")
            .field("bind_addr", &self.bind_addr)
            .field("api_timeout", &self.api_timeout)
            .field("transfer_timeout", &self.transfer_timeout)
            .finish()
    }
}

impl GatewayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の変数ルックアップから構築する。
    ///
    /// 必須変数が1つでも欠けていれば、欠けている変数名をすべて挙げてエラーにする。
    /// 秘密鍵はここで一度パースし、不正な鍵での起動を防ぐ。
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("必須の環境変数が未設定です: {}", missing.join(", "));
        }

        let tams_url = get("TAMS_URL").unwrap_or_default().trim_end_matches('/').to_string();
        let app_id = get("TAMS_APP_ID").unwrap_or_default();
        // .envファイル由来の "\n" エスケープを改行に戻す
        let private_key_pem = get("PRIVATE_KEY_PEM")
            .unwrap_or_default()
            .replace("\\n", "\n");

        pencil2ink_crypto::parse_private_key(&private_key_pem)
            .map_err(|e| anyhow::anyhow!("PRIVATE_KEY_PEMが不正です: {e}"))?;

        let secs = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match get(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| anyhow::anyhow!("{key}は秒数である必要があります: {e}")),
                None => Ok(Duration::from_secs(default)),
            }
        };

        Ok(Self {
            tams_url,
            app_id,
            private_key_pem,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            api_timeout: secs("API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)?,
            transfer_timeout: secs("TRANSFER_TIMEOUT_SECS", DEFAULT_TRANSFER_TIMEOUT_SECS)?,
        })
    }
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// TAMSへの中継
    pub relay: Relay,
    /// アップロード画像の制限
    pub image_limits: ImageLimits,
}
