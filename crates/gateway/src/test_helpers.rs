//! # テスト用共通ヘルパー
//!
//! relay, endpointsのテストで共有するモックサーバーとフィクスチャ。

use std::io::Cursor;
use std::time::Duration;

use crate::config::GatewayConfig;

pub const PRIVATE_KEY: &str = include_str!("../../crypto/tests/fixtures/test_key.pem");
pub const PUBLIC_KEY: &str = include_str!("../../crypto/tests/fixtures/test_key.pub.pem");

/// テスト用のGateway設定。
pub fn test_config(tams_url: &str) -> GatewayConfig {
    GatewayConfig {
        tams_url: tams_url.to_string(),
        app_id: "test-app".to_string(),
        private_key_pem: PRIVATE_KEY.to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        api_timeout: Duration::from_secs(5),
        transfer_timeout: Duration::from_secs(5),
    }
}

/// テスト用モックHTTPサーバーを起動し、ポート番号を返す。
pub async fn start_mock_server(app: axum::Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

/// 指定サイズ・形式の単色画像をエンコードする。
pub fn encode_image(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([200, 200, 200]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}
