//! # Pencil2Ink 暗号処理
//!
//! TAMS APIのリクエスト認証（`TAMS-SHA256-RSA` 方式）を実装する。
//!
//! ## アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | リクエスト署名 | RSA PKCS#1 v1.5 + SHA-256 |
//! | nonce / request_id | MD5（16進小文字） |
//! | 署名エンコード | Base64（Standard） |
//!
//! nonceはタイムスタンプから決定的に導出する。プロバイダの検証器との
//! 互換性のため、乱数に置き換えてはならない。

pub mod tams;

use base64::Engine;
use md5::{Digest, Md5};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};

pub use rsa::{RsaPrivateKey, RsaPublicKey};
pub use tams::{sign, sign_at, sign_request, verify, SignedRequest, AUTH_SCHEME};

/// 署名処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// 秘密鍵のパースに失敗
    #[error("秘密鍵のパースに失敗しました: {0}")]
    InvalidKey(String),
    /// RSA署名に失敗
    #[error("RSA署名に失敗しました: {0}")]
    Sign(String),
    /// システム時刻の取得に失敗
    #[error("時刻取得に失敗しました: {0}")]
    Clock(String),
    /// Authorizationヘッダの形式が不正
    #[error("Authorizationヘッダが不正です: {0}")]
    MalformedHeader(String),
    /// 署名検証に失敗
    #[error("署名検証に失敗しました")]
    VerifyFailed,
}

/// Base64エンジン（Standard）
pub fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// MD5ダイジェストの16進小文字表現。
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// PEM形式のRSA秘密鍵をパースする。
///
/// PKCS#8（`BEGIN PRIVATE KEY`）とPKCS#1（`BEGIN RSA PRIVATE KEY`）の両方を受け付ける。
/// パスワード付きの鍵は扱わない。
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, SigningError> {
    let pem = pem.trim();
    match RsaPrivateKey::from_pkcs8_pem(pem) {
        Ok(key) => Ok(key),
        Err(pkcs8_err) => RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
            SigningError::InvalidKey(format!("PKCS#8: {pkcs8_err}, PKCS#1: {pkcs1_err}"))
        }),
    }
}

/// PEM形式（SPKI）のRSA公開鍵をパースする。
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey, SigningError> {
    RsaPublicKey::from_public_key_pem(pem.trim())
        .map_err(|e| SigningError::InvalidKey(e.to_string()))
}
