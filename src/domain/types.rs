//! コア型定義
//!
//! Domain層の中心となるデータ構造。
//! キャプチャ・分割・分類のすべての処理で共有される不変の型。

use serde::Serialize;
use std::time::Instant;

/// 手の種別（左右判定の結果）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandType {
    /// 左手（2本親指パターンの場合は「両手」を意味する）
    Left,
    /// 右手
    Right,
    /// 判定不能
    Unknown,
}

impl HandType {
    /// 表示用の名称を取得
    pub fn description(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Unknown => "Unknown",
        }
    }
}

/// 指の名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerName {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl FingerName {
    /// 表示用の名称を取得
    pub fn description(&self) -> &'static str {
        match self {
            Self::Thumb => "Thumb",
            Self::Index => "Index",
            Self::Middle => "Middle",
            Self::Ring => "Ring",
            Self::Little => "Little",
        }
    }
}

/// 分割済みの1本指レコード
///
/// Segmentation Adapterが生成した後は不変。
/// 1回のキャプチャ操作の間だけ呼び出し側が所有し、キャプチャをまたいで共有しない。
#[derive(Debug, Clone)]
pub struct FingerRecord {
    /// 指画像データ（8bitグレースケール、width×height）
    pub image_data: Vec<u8>,
    /// 指画像の幅
    pub width: u32,
    /// 指画像の高さ
    pub height: u32,
    /// 元フレーム内の重心X座標
    pub x: i32,
    /// 元フレーム内の重心Y座標
    pub y: i32,
    /// バウンディングボックス上端
    pub top: i32,
    /// バウンディングボックス左端
    pub left: i32,
    /// 回転角（度）。符号規約はエンジン依存（分類器の各分岐が個別に解釈する）
    pub angle: i32,
    /// 指品質スコア [0, 100]
    pub quality: i32,
}

/// 名前が割り当てられた指の位置情報
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FingerPosition {
    pub name: FingerName,
    pub x: i32,
    pub y: i32,
    pub angle: i32,
    pub quality: i32,
}

/// 左右判定の結果
///
/// 分類呼び出しごとに新規生成され、呼び出しを超えた同一性を持たない。
/// `reason`は人間向けの説明文であり、呼び出し側がパースしてはならない。
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// 判定された手の種別
    pub hand_type: HandType,
    /// 信頼度 [0.0, 1.0]
    pub confidence: f64,
    /// 判定根拠（人間向け）
    pub reason: String,
    /// X座標昇順の指位置リスト（割り当てがない場合は空）
    pub finger_positions: Vec<FingerPosition>,
}

impl Classification {
    /// 指位置リストなしの結果を作成
    pub fn new(hand_type: HandType, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            hand_type,
            confidence,
            reason: reason.into(),
            finger_positions: Vec::new(),
        }
    }
}

/// キャプチャされた生フレーム
#[derive(Debug, Clone)]
pub struct Frame {
    /// フレーム取得時刻
    pub timestamp: Instant,
    /// 画像データ（8bitグレースケール、連続メモリ）
    pub data: Vec<u8>,
    /// 画像の幅
    pub width: u32,
    /// 画像の高さ
    pub height: u32,
}

impl Frame {
    /// 新しいフレームを作成
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            timestamp: Instant::now(),
            data,
            width,
            height,
        }
    }
}

/// ストリーミング1フレーム分の配信ペイロード
#[derive(Debug, Clone, Serialize)]
pub struct FramePayload {
    /// トランスポートエンコード済み画像（BMPのbase64データURI）
    pub image: String,
    /// エンジンの品質スコア
    pub quality: i32,
    /// フレーム幅
    pub width: u32,
    /// フレーム高さ
    pub height: u32,
    /// キャプチャ時刻（UNIXエポックからのミリ秒）
    pub timestamp_ms: u64,
}

/// Notification Sinkへ配信されるイベント
///
/// ストリーミングループのエンジン障害は`Fault`として同じシンクに帯域外報告される
/// （`start_streaming`の呼び出し元には再スローされない）。
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// キャプチャ済みフレーム（低品質でも配信される。使用可否は下流が判断する）
    Frame(FramePayload),
    /// ストリーミングループの障害通知
    Fault { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_type_description() {
        assert_eq!(HandType::Left.description(), "Left");
        assert_eq!(HandType::Right.description(), "Right");
        assert_eq!(HandType::Unknown.description(), "Unknown");
    }

    #[test]
    fn test_finger_name_serialize_lowercase() {
        let json = serde_json::to_string(&FingerName::Thumb).unwrap();
        assert_eq!(json, "\"thumb\"");
        let json = serde_json::to_string(&HandType::Left).unwrap();
        assert_eq!(json, "\"left\"");
    }

    #[test]
    fn test_classification_new_has_empty_positions() {
        let c = Classification::new(HandType::Unknown, 0.0, "No finger detected");
        assert!(c.finger_positions.is_empty());
        assert_eq!(c.reason, "No finger detected");
    }

    #[test]
    fn test_frame_new() {
        let frame = Frame::new(vec![0u8; 300 * 400], 300, 400);
        assert_eq!(frame.data.len(), 300 * 400);
        assert_eq!(frame.width, 300);
        assert_eq!(frame.height, 400);
    }
}
