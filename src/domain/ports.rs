/// Port定義（Clean Architectureのインターフェース）
///
/// Domain層が外部実装に依存するための抽象trait。
/// Infrastructure層がこれらを実装し、Application層がDIで注入する。
use crate::domain::{ScanResult, StreamEvent};

/// 分割結果1スロット分のメタデータ
///
/// エンジンのFPSPLIT_INFO相当。画像本体は`SegmentSlot::buffer`に書き込まれる。
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentMeta {
    /// 元フレーム内の重心X座標
    pub x: i32,
    /// 元フレーム内の重心Y座標
    pub y: i32,
    /// バウンディングボックス上端
    pub top: i32,
    /// バウンディングボックス左端
    pub left: i32,
    /// 回転角（度、符号規約はエンジン依存）
    pub angle: i32,
    /// 指品質スコア [0, 100]
    pub quality: i32,
}

/// 分割出力スロット
///
/// 呼び出し側（Segmentation Adapter）が固定出力サイズぶんを事前確保し、
/// エンジンが検出数までのスロットにメタデータと画像を書き込む。
#[derive(Debug)]
pub struct SegmentSlot {
    pub meta: SegmentMeta,
    /// 出力画像バッファ（out_width × out_height バイト）
    pub buffer: Vec<u8>,
}

impl SegmentSlot {
    /// 指定サイズの空スロットを作成
    pub fn with_capacity(out_width: u32, out_height: u32) -> Self {
        Self {
            meta: SegmentMeta::default(),
            // u32同士の乗算はオーバーフローしうるため、usizeに広げてから掛ける
            buffer: vec![0u8; out_width as usize * out_height as usize],
        }
    }
}

/// キャプチャエンジンポート: センサードライバを抽象化
///
/// 実デバイスのネイティブドライバ層を置き換え可能にする狭い同期インターフェース。
/// デバイスハンドルはスレッドセーフと仮定しないため、呼び出し側が
/// `Arc<Mutex<_>>`等で全呼び出しを直列化する。
///
/// 各呼び出しはエンジン固有の非成功コードで失敗しうる。実装は必ず
/// `ScanError::Engine`に変換し、生のコードを解釈なしで返してはならない。
pub trait CaptureEnginePort: Send {
    /// デバイスとの接続を開く
    fn open(&mut self) -> ScanResult<()>;

    /// デバイスとの接続を閉じる
    fn close(&mut self) -> ScanResult<()>;

    /// キャプチャウィンドウ（センサー上の取得領域）を設定する
    fn set_capture_window(&mut self, x: u32, y: u32, width: u32, height: u32) -> ScanResult<()>;

    /// 生フレームを1枚取得する（ブロッキング）
    ///
    /// # Returns
    /// - `Ok(Vec<u8>)`: width×heightバイトのグレースケールデータ
    /// - `Err(ScanError::Engine)`: エンジンが非成功コードを返した
    fn get_frame(&mut self, width: u32, height: u32) -> ScanResult<Vec<u8>>;

    /// 合成フレームを指ごとのサブ画像に分割する
    ///
    /// 検出された指の数 `n`（0 <= n <= slots.len()）を返し、先頭`n`スロットに
    /// メタデータと`out_width`×`out_height`の画像を書き込む。
    /// `n = 0`は「指なし」の正常結果でありエラーではない。
    #[allow(clippy::too_many_arguments)]
    fn segment(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        out_width: u32,
        out_height: u32,
        slots: &mut [SegmentSlot],
    ) -> ScanResult<usize>;

    /// フレームの指品質スコアを算出する
    fn score(&mut self, frame: &[u8], width: u32, height: u32) -> ScanResult<i32>;

    /// 指の乾湿レベルを設定する（dry=5, normal=4, wet=3）
    fn set_finger_dry_wet(&mut self, level: u32) -> ScanResult<()>;

    /// デバイスのビープ音を鳴らす
    fn beep(&mut self, times: u32) -> ScanResult<()>;
}

/// 通知シンクポート: ストリーミングフレームの配信先を抽象化
///
/// 配信はコアから見てfire-and-forget（確認応答を待たない）。
pub trait NotificationSink: Send + Sync {
    /// イベントを配信する
    fn publish(&self, event: StreamEvent);
}
