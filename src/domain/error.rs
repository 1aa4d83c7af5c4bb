/// エラー型定義
///
/// Domain層の統一エラー型。thiserrorを使用して型安全なエラー処理を提供します。
///
/// # 設計方針
/// - unwrap()の使用を禁止し、明示的なエラーハンドリングを強制
/// - Result型でエラー伝播を明示化
/// - エンジンの生の非成功コードは`Engine`に保持し、解釈なしで上位へ流出させない
use thiserror::Error;

/// Domain層の統一エラー型
#[derive(Error, Debug)]
pub enum ScanError {
    /// 呼び出し側の引数（寸法・バッファ等）が静的検査に失敗
    ///
    /// デバイスに触れる前に拒否されるため、常にローカルで回復可能。
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// デバイスが開いていない状態で開いたデバイスを要する操作が呼ばれた
    #[error("Device is not open")]
    NotOpen,

    /// ストリーミング中に再度start_streamingが呼ばれた
    ///
    /// 同一デバイスに対して2つのループは並走させない（キューイングもしない）。
    #[error("Streaming capture is already running")]
    AlreadyCapturing,

    /// Capture Engineが非成功コードを返した
    ///
    /// 診断のため元のコードを保持する。自動リトライはしない。
    #[error("Engine call '{op}' failed with code {code}")]
    Engine { op: &'static str, code: i32 },

    /// ストリーミングループ内のエンジン障害
    ///
    /// ループは自ら終了して状態をidleへ戻し、Notification Sink経由で帯域外報告される。
    #[error("Streaming fault: {0}")]
    Streaming(String),

    /// 設定関連のエラー
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Domain層の統一Result型
pub type ScanResult<T> = Result<T, ScanError>;
