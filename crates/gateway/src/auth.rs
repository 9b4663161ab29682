//! # TAMS認証付きリクエスト
//!
//! Authorizationヘッダの付与とTAMS APIへのリクエスト送信。
//! 署名したボディと送信するボディは同一のバイト列でなければならないため、
//! JSONは呼び出し側で一度だけ文字列化し、そのまま送る。

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;

use crate::config::GatewayConfig;
use crate::error::RelayError;

/// TAMS APIの上流レスポンス。
#[derive(Debug)]
pub(crate) struct ProviderResponse {
    pub status: reqwest::StatusCode,
    pub body: String,
}

/// 署名付きでTAMS APIを呼び出すクライアント。
pub struct TamsClient {
    base_url: String,
    app_id: String,
    private_key_pem: String,
    http_client: reqwest::Client,
    api_timeout: Duration,
}

impl TamsClient {
    pub fn new(config: &GatewayConfig, http_client: reqwest::Client) -> Self {
        Self {
            base_url: config.tams_url.clone(),
            app_id: config.app_id.clone(),
            private_key_pem: config.private_key_pem.clone(),
            http_client,
            api_timeout: config.api_timeout,
        }
    }

    /// 署名なしの呼び出し（PUTアップロード・結果取得）にも同じ接続プールを使う。
    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Authorizationヘッダ値を生成する。
    pub(crate) fn authorization(
        &self,
        method: &Method,
        path: &str,
        body: &str,
    ) -> Result<String, RelayError> {
        Ok(pencil2ink_crypto::sign(
            method.as_str(),
            path,
            body,
            &self.app_id,
            &self.private_key_pem,
        )?)
    }

    /// 署名付きリクエストを送信し、ステータスとボディを返す。
    ///
    /// 非成功ステータスの判定は呼び出し側が行う。送信自体の失敗は
    /// `context` を付けた上流エラーとして返す。
    pub(crate) async fn send_signed(
        &self,
        method: Method,
        path: &str,
        body: &str,
        context: &str,
    ) -> Result<ProviderResponse, RelayError> {
        let authorization = self.authorization(&method, path, body)?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .timeout(self.api_timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, authorization);
        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::transport(context, None, e))?;

        let status = response.status();
        let body = response.text()
            .await
            .map_err(|e| RelayError::transport(context, Some(status.as_u16()), e))?;

        tracing::debug!(method = %method, path = %path, status = %status, "TAMS APIを呼び出しました");

        Ok(ProviderResponse { status, body })
    }
}
