//! 設定管理
//!
//! TOML設定ファイルの読み込みとDomain型への変換。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{ScanError, ScanResult};

/// 指の乾湿タイプ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FingerCondition {
    /// 乾燥指（感度を上げる）
    Dry,
    /// 通常
    #[default]
    Normal,
    /// 湿潤指（感度を下げる）
    Wet,
}

impl FingerCondition {
    /// エンジンの乾湿レベルに変換（dry=5, normal=4, wet=3）
    pub fn to_engine_level(self) -> u32 {
        match self {
            Self::Dry => 5,
            Self::Normal => 4,
            Self::Wet => 3,
        }
    }
}

/// アプリケーション設定のルート構造
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// デバイス設定
    pub device: DeviceConfig,
    /// ストリーミングキャプチャ設定
    pub stream: StreamConfig,
    /// 入力検証設定
    pub validator: ValidatorConfig,
    /// 指分割設定
    pub segmentation: SegmentationConfig,
    /// 品質ゲート設定
    pub quality: QualityConfig,
}

/// デバイス設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeviceConfig {
    /// 合成フレーム（マルチ指キャプチャ）の幅（ピクセル）
    ///
    /// デフォルト: 1600
    pub frame_width: u32,

    /// 合成フレームの高さ（ピクセル）
    ///
    /// デフォルト: 1500
    pub frame_height: u32,

    /// 単指キャプチャの幅（ピクセル）
    ///
    /// デフォルト: 300
    pub single_width: u32,

    /// 単指キャプチャの高さ（ピクセル）
    ///
    /// デフォルト: 400
    pub single_height: u32,

    /// 起動時に設定する指の乾湿タイプ
    ///
    /// 選択肢: "dry", "normal", "wet"
    #[serde(default)]
    pub finger_condition: FingerCondition,
}

impl DeviceConfig {
    /// デフォルトの合成フレーム幅
    pub const DEFAULT_FRAME_WIDTH: u32 = 1600;
    /// デフォルトの合成フレーム高さ
    pub const DEFAULT_FRAME_HEIGHT: u32 = 1500;
    /// デフォルトの単指キャプチャ幅
    pub const DEFAULT_SINGLE_WIDTH: u32 = 300;
    /// デフォルトの単指キャプチャ高さ
    pub const DEFAULT_SINGLE_HEIGHT: u32 = 400;
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            frame_width: Self::DEFAULT_FRAME_WIDTH,
            frame_height: Self::DEFAULT_FRAME_HEIGHT,
            single_width: Self::DEFAULT_SINGLE_WIDTH,
            single_height: Self::DEFAULT_SINGLE_HEIGHT,
            finger_condition: FingerCondition::Normal,
        }
    }
}

/// ストリーミングキャプチャ設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StreamConfig {
    /// ストリーミングフレームの幅（ピクセル）
    ///
    /// デフォルト: 1600
    pub width: u32,

    /// ストリーミングフレームの高さ（ピクセル）
    ///
    /// デフォルト: 1500
    pub height: u32,

    /// フレーム取得間隔（ミリ秒）
    ///
    /// デフォルト: 200ms（5 FPS）
    pub interval_ms: u64,

    /// Notification Sinkのキュー容量
    ///
    /// キューが満杯の場合、新しいイベントは破棄される（fire-and-forget）。
    /// デフォルト: 8
    pub sink_capacity: usize,
}

impl StreamConfig {
    /// デフォルトのフレーム取得間隔（ミリ秒、5 FPS）
    pub const DEFAULT_INTERVAL_MS: u64 = 200;
    /// デフォルトのシンクキュー容量
    pub const DEFAULT_SINK_CAPACITY: usize = 8;

    /// フレーム取得間隔をDurationとして取得
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: DeviceConfig::DEFAULT_FRAME_WIDTH,
            height: DeviceConfig::DEFAULT_FRAME_HEIGHT,
            interval_ms: Self::DEFAULT_INTERVAL_MS,
            sink_capacity: Self::DEFAULT_SINK_CAPACITY,
        }
    }
}

/// 入力検証設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValidatorConfig {
    /// 許容される最小寸法（幅・高さ共通、ピクセル）
    ///
    /// デフォルト: 100
    pub min_dimension: u32,

    /// 許容される最大寸法（幅・高さ共通、ピクセル）
    ///
    /// デフォルト: 4000
    pub max_dimension: u32,
}

impl ValidatorConfig {
    /// デフォルトの最小寸法
    pub const DEFAULT_MIN_DIMENSION: u32 = 100;
    /// デフォルトの最大寸法
    pub const DEFAULT_MAX_DIMENSION: u32 = 4000;
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_dimension: Self::DEFAULT_MIN_DIMENSION,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
        }
    }
}

/// 指分割設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmentationConfig {
    /// 分割出力サブ画像の幅（ピクセル）
    ///
    /// デフォルト: 300
    pub out_width: u32,

    /// 分割出力サブ画像の高さ（ピクセル）
    ///
    /// デフォルト: 400
    pub out_height: u32,

    /// 出力スロット数（エンジンの最大検出数）
    ///
    /// デフォルト: 10
    pub max_outputs: usize,
}

impl SegmentationConfig {
    /// エンジンが1フレームから検出できる指の最大数
    pub const ENGINE_MAX_OUTPUTS: usize = 10;
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            out_width: DeviceConfig::DEFAULT_SINGLE_WIDTH,
            out_height: DeviceConfig::DEFAULT_SINGLE_HEIGHT,
            max_outputs: Self::ENGINE_MAX_OUTPUTS,
        }
    }
}

/// 品質ゲート設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QualityConfig {
    /// 左右判定フローの最低フレーム品質
    ///
    /// デフォルト: 20
    pub hand_detect_threshold: i32,

    /// マルチ指キャプチャフローの最低フレーム品質
    ///
    /// デフォルト: 30
    pub multi_capture_threshold: i32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            hand_detect_threshold: 20,
            multi_capture_threshold: 30,
        }
    }
}

impl AppConfig {
    /// TOMLファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> ScanResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Configuration(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ScanError::Configuration(format!("Failed to parse config file: {}", e)))
    }

    /// デフォルト設定をTOMLファイルに書き出す
    #[allow(dead_code)]
    pub fn write_default<P: AsRef<Path>>(path: P) -> ScanResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| ScanError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ScanError::Configuration(format!("Failed to write config file: {}", e)))
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> ScanResult<()> {
        // 検証レンジ自体の整合性
        if self.validator.min_dimension == 0 || self.validator.min_dimension > self.validator.max_dimension {
            return Err(ScanError::Configuration(
                "Validator dimension range must satisfy 0 < min <= max".to_string(),
            ));
        }

        // フレーム寸法は検証レンジ内でなければ起動時点で矛盾する
        let in_range = |v: u32| v >= self.validator.min_dimension && v <= self.validator.max_dimension;
        if !in_range(self.device.frame_width) || !in_range(self.device.frame_height) {
            return Err(ScanError::Configuration(format!(
                "Device frame size {}x{} is outside the validator range [{}, {}]",
                self.device.frame_width,
                self.device.frame_height,
                self.validator.min_dimension,
                self.validator.max_dimension
            )));
        }
        if !in_range(self.stream.width) || !in_range(self.stream.height) {
            return Err(ScanError::Configuration(format!(
                "Stream frame size {}x{} is outside the validator range [{}, {}]",
                self.stream.width,
                self.stream.height,
                self.validator.min_dimension,
                self.validator.max_dimension
            )));
        }

        // ストリーミング間隔の検証
        if self.stream.interval_ms == 0 {
            return Err(ScanError::Configuration(
                "Stream interval must be greater than 0".to_string(),
            ));
        }
        if self.stream.sink_capacity == 0 {
            return Err(ScanError::Configuration(
                "Sink capacity must be greater than 0".to_string(),
            ));
        }

        // 分割設定の検証（出力サイズもフレーム寸法と同じレンジで上限を画す）
        if !in_range(self.segmentation.out_width) || !in_range(self.segmentation.out_height) {
            return Err(ScanError::Configuration(format!(
                "Segmentation output size {}x{} is outside the validator range [{}, {}]",
                self.segmentation.out_width,
                self.segmentation.out_height,
                self.validator.min_dimension,
                self.validator.max_dimension
            )));
        }
        if self.segmentation.max_outputs == 0
            || self.segmentation.max_outputs > SegmentationConfig::ENGINE_MAX_OUTPUTS
        {
            return Err(ScanError::Configuration(format!(
                "Segmentation max_outputs must be in [1, {}]",
                SegmentationConfig::ENGINE_MAX_OUTPUTS
            )));
        }

        // 品質ゲートの検証
        for threshold in [
            self.quality.hand_detect_threshold,
            self.quality.multi_capture_threshold,
        ] {
            if !(0..=100).contains(&threshold) {
                return Err(ScanError::Configuration(format!(
                    "Quality threshold {} is outside [0, 100]",
                    threshold
                )));
            }
        }

        Ok(())
    }
}
