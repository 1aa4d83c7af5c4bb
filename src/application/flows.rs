//! 高水準キャプチャフロー
//!
//! セッション・バリデータ・分割アダプタ・分類器を束ねた単発キャプチャの
//! ユースケース。各フローは「キャプチャ → 品質ゲート → 分割 → 分類/整形」を
//! 1トランザクションとして実行する。ビジネス上の失格（品質不足・指なし・
//! 本数不一致）はエラーではなく結果enumの値として返す。

use crate::application::classifier;
use crate::application::segmentation::SegmentationAdapter;
use crate::application::session::CaptureSession;
use crate::application::validator::CaptureValidator;
use crate::domain::{
    CaptureEnginePort, Classification, DeviceConfig, FingerRecord, QualityConfig, ScanResult,
};
use crate::infrastructure::encode;

use serde::Serialize;
use std::sync::Arc;

/// 手検出フローの結果
#[derive(Debug)]
pub enum DetectHandOutcome {
    /// 品質が手検出閾値（デフォルト20）未満
    InsufficientQuality { quality: i32 },
    /// 品質は十分だが指が1本も検出されなかった
    NoFingers { quality: i32 },
    /// 手の種別を判定できた
    Detected {
        quality: i32,
        finger_count: usize,
        classification: Classification,
    },
}

/// 親指の左右位置（X昇順の並びに基づく）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbSide {
    Left,
    Right,
}

/// 両親指キャプチャで得られた1枚の親指画像
#[derive(Debug, Clone, Serialize)]
pub struct ThumbImage {
    /// `data:image/bmp;base64,`形式の画像
    pub image: String,
    pub side: ThumbSide,
    pub quality: i32,
    pub angle: i32,
    pub x: i32,
    pub y: i32,
}

/// 両親指キャプチャフローの結果
#[derive(Debug)]
pub enum TwoThumbOutcome {
    /// 指が1本も検出されなかった
    NoFingers { quality: i32 },
    /// 検出本数が2本ではなかった
    UnexpectedCount { detected: usize, quality: i32 },
    /// 2本の親指をキャプチャできた
    Captured {
        thumbs: Vec<ThumbImage>,
        quality: i32,
        classification: Classification,
    },
}

/// 複数指キャプチャで得られた1枚の指画像
#[derive(Debug, Clone, Serialize)]
pub struct FingerImage {
    /// `data:image/bmp;base64,`形式の画像
    pub image: String,
    pub quality: i32,
    pub angle: i32,
    pub x: i32,
    pub y: i32,
}

/// 複数指キャプチャフローの結果
#[derive(Debug)]
pub enum MultiCaptureOutcome {
    /// 品質が複数指キャプチャ閾値（デフォルト30）未満
    InsufficientQuality { quality: i32 },
    /// キャプチャ完了（指0本も正常）
    Captured {
        fingers: Vec<FingerImage>,
        quality: i32,
    },
}

/// キャプチャフロー実行器
///
/// セッションを共有参照で保持し、ストリーミングと並行して呼び出せる
/// （エンジンアクセスはセッション側で直列化される）。
pub struct CaptureFlows<E: CaptureEnginePort + 'static> {
    session: Arc<CaptureSession<E>>,
    segmentation: SegmentationAdapter,
    validator: CaptureValidator,
    device: DeviceConfig,
    quality: QualityConfig,
}

impl<E: CaptureEnginePort + 'static> CaptureFlows<E> {
    pub fn new(
        session: Arc<CaptureSession<E>>,
        segmentation: SegmentationAdapter,
        validator: CaptureValidator,
        device: DeviceConfig,
        quality: QualityConfig,
    ) -> Self {
        Self {
            session,
            segmentation,
            validator,
            device,
            quality,
        }
    }

    /// フルフレームを1枚キャプチャして品質スコアと合わせて返す
    fn acquire_full_frame(&self) -> ScanResult<(crate::domain::Frame, i32)> {
        let width = self.device.frame_width;
        let height = self.device.frame_height;
        let frame = self.session.capture_single(width, height)?;
        let quality = self.session.score(&frame)?;
        Ok((frame, quality))
    }

    /// フレームを指ごとに分割する
    fn segment(&self, frame: &crate::domain::Frame) -> ScanResult<Vec<FingerRecord>> {
        self.session.with_engine(|engine| {
            self.segmentation
                .split(engine, &frame.data, frame.width, frame.height)
        })
    }

    /// 手の種別を検出する
    ///
    /// 品質ゲート（手検出閾値）を通らなければ分割・分類は行わない。
    pub fn detect_hand(&self) -> ScanResult<DetectHandOutcome> {
        let (frame, quality) = self.acquire_full_frame()?;

        if !self
            .validator
            .is_quality_acceptable(quality, self.quality.hand_detect_threshold)
        {
            tracing::info!("Hand detection skipped: quality {} below threshold", quality);
            return Ok(DetectHandOutcome::InsufficientQuality { quality });
        }

        let records = self.segment(&frame)?;
        if records.is_empty() {
            tracing::info!("Hand detection found no fingers (quality={})", quality);
            return Ok(DetectHandOutcome::NoFingers { quality });
        }

        let classification = classifier::classify(&records);
        tracing::info!(
            "Hand detected: {} (confidence={}, fingers={})",
            classification.hand_type.description(),
            classification.confidence,
            records.len()
        );

        Ok(DetectHandOutcome::Detected {
            quality,
            finger_count: records.len(),
            classification,
        })
    }

    /// 両親指を同時キャプチャする
    ///
    /// ちょうど2本検出された場合のみ成功。成功時はX昇順（左・右）に
    /// 並べた2枚のサブ画像を返し、ビープを2回鳴らす。
    pub fn capture_two_thumbs(&self) -> ScanResult<TwoThumbOutcome> {
        let (frame, quality) = self.acquire_full_frame()?;

        let mut records = self.segment(&frame)?;
        if records.is_empty() {
            tracing::info!("Two-thumb capture found no fingers (quality={})", quality);
            return Ok(TwoThumbOutcome::NoFingers { quality });
        }
        if records.len() != 2 {
            tracing::info!(
                "Two-thumb capture expected 2 fingers, detected {}",
                records.len()
            );
            return Ok(TwoThumbOutcome::UnexpectedCount {
                detected: records.len(),
                quality,
            });
        }

        let classification = classifier::classify(&records);

        // X昇順: 画像上の左が先
        records.sort_by_key(|r| r.x);
        let thumbs = records
            .iter()
            .enumerate()
            .map(|(i, record)| ThumbImage {
                image: encode::raw_to_data_uri(&record.image_data, record.width, record.height),
                side: if i == 0 { ThumbSide::Left } else { ThumbSide::Right },
                quality: record.quality,
                angle: record.angle,
                x: record.x,
                y: record.y,
            })
            .collect();

        if let Err(e) = self.session.beep(2) {
            tracing::warn!("Beep failed after two-thumb capture: {}", e);
        }

        tracing::info!("Two-thumb capture completed (quality={})", quality);
        Ok(TwoThumbOutcome::Captured {
            thumbs,
            quality,
            classification,
        })
    }

    /// 複数指を一括キャプチャする
    ///
    /// 品質ゲート（複数指閾値）を通らなければ分割しない。
    /// 検出0本は正常な空結果。成功時はビープを1回鳴らす。
    pub fn capture_multiple(&self) -> ScanResult<MultiCaptureOutcome> {
        let (frame, quality) = self.acquire_full_frame()?;

        if !self
            .validator
            .is_quality_acceptable(quality, self.quality.multi_capture_threshold)
        {
            tracing::info!(
                "Multi-finger capture skipped: quality {} below threshold",
                quality
            );
            return Ok(MultiCaptureOutcome::InsufficientQuality { quality });
        }

        let records = self.segment(&frame)?;
        let fingers = records
            .iter()
            .map(|record| FingerImage {
                image: encode::raw_to_data_uri(&record.image_data, record.width, record.height),
                quality: record.quality,
                angle: record.angle,
                x: record.x,
                y: record.y,
            })
            .collect::<Vec<_>>();

        if let Err(e) = self.session.beep(1) {
            tracing::warn!("Beep failed after multi-finger capture: {}", e);
        }

        tracing::info!(
            "Multi-finger capture completed: {} finger(s) (quality={})",
            fingers.len(),
            quality
        );
        Ok(MultiCaptureOutcome::Captured { fingers, quality })
    }
}
