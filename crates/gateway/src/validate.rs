//! # アップロード画像の検証
//!
//! サイズ → 形式 → 解像度の順に検査し、通過した画像の幅と高さを返す。
//! 解像度はヘッダのみを読んで取得し、画素データはデコードしない。

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::error::RelayError;

/// ファイルサイズ超過時のメッセージ
pub const FILE_TOO_LARGE: &str = "File size must be under 1 MB";

/// アップロード画像の制限。
#[derive(Debug, Clone, Copy)]
pub struct ImageLimits {
    /// 最大ファイルサイズ（バイト）
    pub max_bytes: usize,
    /// 幅・高さそれぞれの最大値（ピクセル）
    pub max_dimension: u32,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_bytes: 1_000_000,
            max_dimension: 1500,
        }
    }
}

/// 検証済み画像の解像度。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// 画像を検証する。JPEGとPNGのみ受け付ける。
pub fn validate_image(bytes: &[u8], limits: &ImageLimits) -> Result<ImageDimensions, RelayError> {
    if bytes.len() > limits.max_bytes {
        return Err(RelayError::InvalidImage(FILE_TOO_LARGE.to_string()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RelayError::InvalidImage(format!("Invalid image file: {e}")))?;

    match reader.format() {
        Some(ImageFormat::Jpeg) | Some(ImageFormat::Png) => {}
        Some(_) => {
            return Err(RelayError::InvalidImage(
                "Only JPG and PNG formats allowed".to_string(),
            ))
        }
        None => {
            return Err(RelayError::InvalidImage(
                "Invalid image file: unrecognized image format".to_string(),
            ))
        }
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| RelayError::InvalidImage(format!("Invalid image file: {e}")))?;

    if width > limits.max_dimension || height > limits.max_dimension {
        return Err(RelayError::InvalidImage(
            "Image dimensions must be under 1500×1500px".to_string(),
        ));
    }

    Ok(ImageDimensions { width, height })
}
