//! キャプチャ入力検証
//!
//! デバイスに触れる前に実行されるステートレスなガード。
//! 寸法・バッファ長・品質値の境界検査と、構造的に空のバッファの検出を行う。

use crate::domain::{ScanError, ScanResult, ValidatorConfig};

/// 品質スコアの下限
const MIN_QUALITY: i32 = 0;
/// 品質スコアの上限
const MAX_QUALITY: i32 = 100;

/// 構造的空バッファ判定のサンプル上限（バイト）
const DEGENERATE_SAMPLE_SIZE: usize = 1000;
/// 0x00/0xFFの占有率がこの値以上なら構造的に空とみなす
const DEGENERATE_RATIO: f64 = 0.95;

/// キャプチャ入力バリデータ
///
/// すべての検査は副作用を持たない純粋な境界チェック。
#[derive(Debug, Clone)]
pub struct CaptureValidator {
    config: ValidatorConfig,
}

impl CaptureValidator {
    /// 設定された寸法レンジでバリデータを作成
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// 画像寸法を検証する
    ///
    /// 幅・高さの両方が設定レンジ（デフォルト100〜4000、両端含む）に
    /// 収まらなければ`InvalidArgument`で失敗する。
    pub fn validate_dimensions(&self, width: u32, height: u32) -> ScanResult<()> {
        let min = self.config.min_dimension;
        let max = self.config.max_dimension;

        if width < min || width > max {
            return Err(ScanError::InvalidArgument(format!(
                "Invalid width: {} (must be between {} and {})",
                width, min, max
            )));
        }
        if height < min || height > max {
            return Err(ScanError::InvalidArgument(format!(
                "Invalid height: {} (must be between {} and {})",
                height, min, max
            )));
        }
        Ok(())
    }

    /// 画像バッファの長さを検証する
    pub fn validate_buffer(&self, buffer: &[u8], expected_size: usize) -> ScanResult<()> {
        if buffer.len() < expected_size {
            return Err(ScanError::InvalidArgument(format!(
                "Insufficient buffer: expected {} bytes, received {}",
                expected_size,
                buffer.len()
            )));
        }
        Ok(())
    }

    /// 検証済みの安全なバッファ長を算出する
    pub fn safe_buffer_len(&self, width: u32, height: u32) -> ScanResult<usize> {
        self.validate_dimensions(width, height)?;
        Ok((width as usize) * (height as usize))
    }

    /// 品質スコアを[0, 100]にクランプする。失敗しない。
    pub fn normalize_quality(&self, quality: i32) -> i32 {
        quality.clamp(MIN_QUALITY, MAX_QUALITY)
    }

    /// 品質スコアが閾値以上かを判定する
    ///
    /// [0, 100]の範囲外の値は閾値と比較する前に警告を出してfalseを返す。
    pub fn is_quality_acceptable(&self, quality: i32, threshold: i32) -> bool {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            tracing::warn!("Quality outside the valid range: {}", quality);
            return false;
        }
        quality >= threshold
    }

    /// バッファに有効なデータがあるかを判定する
    ///
    /// 先頭`min(1000, len)`バイトをサンプリングし、0x00と0xFFの占有率を数える。
    /// どちらかが95%以上ならセンサー未接触または飽和とみなしてfalse。
    /// 品質スコアではなく、安価で近似的な健全性チェック。
    pub fn has_valid_data(&self, buffer: &[u8]) -> bool {
        if buffer.is_empty() {
            return false;
        }

        let sample_size = DEGENERATE_SAMPLE_SIZE.min(buffer.len());
        let mut zeros = 0usize;
        let mut max_values = 0usize;

        for &value in &buffer[..sample_size] {
            if value == 0 {
                zeros += 1;
            }
            if value == 255 {
                max_values += 1;
            }
        }

        let zero_ratio = zeros as f64 / sample_size as f64;
        let max_ratio = max_values as f64 / sample_size as f64;

        zero_ratio < DEGENERATE_RATIO && max_ratio < DEGENERATE_RATIO
    }
}

impl Default for CaptureValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}
