//! # TAMS-SHA256-RSA リクエスト署名
//!
//! 署名対象文字列は次の5フィールドを改行で連結したもの（この順序で固定）:
//!
//! ```text
//! METHOD\nPATH\nTIMESTAMP\nNONCE\nBODY
//! ```
//!
//! Authorizationヘッダはプロバイダの検証器がそのまま解釈するため、
//! キー順・区切り文字・空白の有無を含めてビット単位で一致させる必要がある。

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::RsaPublicKey;
use sha2::Sha256;

use crate::{b64, md5_hex, parse_private_key, SigningError};

/// Authorizationヘッダの認証スキーム名
pub const AUTH_SCHEME: &str = "TAMS-SHA256-RSA";

/// 署名済みリクエスト。永続化しない一時的な値。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// 大文字化済みのHTTPメソッド
    pub method: String,
    pub path: String,
    /// 送信するボディそのもの（GET等では空文字列）
    pub body: String,
    /// UNIX秒（10進文字列）
    pub timestamp: String,
    /// `md5(timestamp)` の16進表現
    pub nonce: String,
    pub signature_b64: String,
}

impl SignedRequest {
    /// 署名対象文字列を再構築する。
    pub fn string_to_sign(&self) -> String {
        string_to_sign(&self.method, &self.path, &self.timestamp, &self.nonce, &self.body)
    }

    /// Authorizationヘッダ値を構築する。
    pub fn authorization_header(&self, app_id: &str) -> String {
        format!(
            "{AUTH_SCHEME} app_id={},nonce_str={},timestamp={},signature={}",
            app_id, self.nonce, self.timestamp, self.signature_b64
        )
    }
}

/// タイムスタンプからnonceを導出する。
pub fn nonce_for(timestamp: &str) -> String {
    md5_hex(timestamp.as_bytes())
}

fn string_to_sign(method: &str, path: &str, timestamp: &str, nonce: &str, body: &str) -> String {
    format!("{method}\n{path}\n{timestamp}\n{nonce}\n{body}")
}

/// 現在のUNIX秒。
pub fn unix_seconds() -> Result<u64, SigningError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| SigningError::Clock(e.to_string()))
}

/// 指定タイムスタンプでリクエストに署名する。
///
/// 秘密鍵は呼び出しごとにPEMからパースする。共有状態を持たないため並行に呼び出してよい。
pub fn sign_request(
    method: &str,
    path: &str,
    body: &str,
    private_key_pem: &str,
    timestamp: u64,
) -> Result<SignedRequest, SigningError> {
    let method = method.to_uppercase();
    let timestamp = timestamp.to_string();
    let nonce = nonce_for(&timestamp);
    let to_sign = string_to_sign(&method, path, &timestamp, &nonce, body);

    let private_key = parse_private_key(private_key_pem)?;
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let signature = signing_key
        .try_sign(to_sign.as_bytes())
        .map_err(|e| SigningError::Sign(e.to_string()))?;

    Ok(SignedRequest {
        method,
        path: path.to_string(),
        body: body.to_string(),
        timestamp,
        nonce,
        signature_b64: b64().encode(signature.to_vec()),
    })
}

/// 指定タイムスタンプでAuthorizationヘッダ値を生成する。
pub fn sign_at(
    method: &str,
    path: &str,
    body: &str,
    app_id: &str,
    private_key_pem: &str,
    timestamp: u64,
) -> Result<String, SigningError> {
    Ok(sign_request(method, path, body, private_key_pem, timestamp)?.authorization_header(app_id))
}

/// 現在時刻でAuthorizationヘッダ値を生成する。
pub fn sign(
    method: &str,
    path: &str,
    body: &str,
    app_id: &str,
    private_key_pem: &str,
) -> Result<String, SigningError> {
    sign_at(method, path, body, app_id, private_key_pem, unix_seconds()?)
}

/// Authorizationヘッダから取り出したフィールド。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationFields {
    pub app_id: String,
    pub nonce_str: String,
    pub timestamp: String,
    pub signature: String,
}

/// Authorizationヘッダをパースする。キーの順序も検査する。
pub fn parse_authorization(header: &str) -> Result<AuthorizationFields, SigningError> {
    let params = header
        .strip_prefix(AUTH_SCHEME)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| SigningError::MalformedHeader(format!("{AUTH_SCHEME} で始まっていません")))?;

    let mut values = Vec::with_capacity(4);
    for (part, expected_key) in params
        .split(',')
        .zip(["app_id", "nonce_str", "timestamp", "signature"])
    {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| SigningError::MalformedHeader(format!("key=value形式ではありません: {part}")))?;
        if key != expected_key {
            return Err(SigningError::MalformedHeader(format!(
                "{expected_key} を期待しましたが {key} でした"
            )));
        }
        values.push(value.to_string());
    }

    if params.split(',').count() != 4 {
        return Err(SigningError::MalformedHeader(
            "フィールド数が4ではありません".to_string(),
        ));
    }

    let [app_id, nonce_str, timestamp, signature]: [String; 4] = values
        .try_into()
        .map_err(|_| SigningError::MalformedHeader("フィールド数が4ではありません".to_string()))?;

    Ok(AuthorizationFields {
        app_id,
        nonce_str,
        timestamp,
        signature,
    })
}

/// プロバイダ側と同じ手順でAuthorizationヘッダを検証する。
///
/// nonceがタイムスタンプから導出されたものであることも確認する。
pub fn verify(
    header: &str,
    method: &str,
    path: &str,
    body: &str,
    public_key: &RsaPublicKey,
) -> Result<AuthorizationFields, SigningError> {
    let fields = parse_authorization(header)?;
    if fields.nonce_str != nonce_for(&fields.timestamp) {
        return Err(SigningError::VerifyFailed);
    }

    let to_sign = string_to_sign(
        &method.to_uppercase(),
        path,
        &fields.timestamp,
        &fields.nonce_str,
        body,
    );
    let sig_bytes = b64()
        .decode(&fields.signature)
        .map_err(|e| SigningError::MalformedHeader(format!("signatureのBase64デコードに失敗: {e}")))?;
    let signature =
        Signature::try_from(sig_bytes.as_slice()).map_err(|_| SigningError::VerifyFailed)?;

    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(to_sign.as_bytes(), &signature)
        .map_err(|_| SigningError::VerifyFailed)?;

    Ok(fields)
}
