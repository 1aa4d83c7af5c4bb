//! キャプチャセッション制御
//!
//! デバイスのライフサイクル（開閉）と、取消可能な周期キャプチャループを管理する。
//! 状態はClosed / OpenIdle / OpenCapturingの3状態で、
//! `Arc<AtomicBool>`2枚のロックフリーなフラグとして表現される
//! （不変条件: capturing ⇒ device_open）。
//!
//! # 並行性モデル
//! エンジンハンドルは共有・非リエントラントな単一リソースであり、
//! `Arc<Mutex<_>>`で全呼び出しを直列化する。ストリーミングループは
//! 専用ワーカースレッド1本で、取消は協調的（各イテレーション先頭と
//! 配信後に取消フラグを確認する）。`close()`はループのjoinを待ってから
//! エンジンのcloseを発行するため、use-after-closeは起きない。

use crate::domain::{
    CaptureEnginePort, FingerCondition, Frame, FramePayload, NotificationSink, ScanError,
    ScanResult, StreamConfig, StreamEvent,
};
use crate::application::validator::CaptureValidator;
use crate::infrastructure::encode;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

/// セッション状態（スレッド間で共有、ロックフリー）
///
/// 1つの`CaptureSession`だけが書き込み、読み取りは任意のスレッドから行える。
#[derive(Clone)]
pub struct SessionState {
    /// デバイスが開いているか
    device_open: Arc<AtomicBool>,
    /// ストリーミングループが稼働中か
    capturing: Arc<AtomicBool>,
}

impl SessionState {
    /// 閉じた・アイドル状態で作成
    pub fn new() -> Self {
        Self {
            device_open: Arc::new(AtomicBool::new(false)),
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// デバイスが開いているかを確認（ロックフリー）
    #[inline]
    pub fn is_device_open(&self) -> bool {
        self.device_open.load(Ordering::Acquire)
    }

    /// ストリーミング中かを確認（ロックフリー）
    #[inline]
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    fn set_device_open(&self, open: bool) {
        self.device_open.store(open, Ordering::Release);
    }

    fn set_capturing(&self, capturing: bool) {
        self.capturing.store(capturing, Ordering::Release);
    }

    /// capturingをfalse→trueへ排他的に遷移させる
    ///
    /// 既にtrueの場合はfalseを返す（二重起動の拒否に使う）。
    fn try_begin_capturing(&self) -> bool {
        self.capturing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// キャプチャセッションコントローラ
///
/// プロセス内で論理デバイス1台を所有する。`&self`の全操作は
/// 複数スレッドから並行に呼び出せる。
pub struct CaptureSession<E: CaptureEnginePort + 'static> {
    engine: Arc<Mutex<E>>,
    state: SessionState,
    sink: Arc<dyn NotificationSink>,
    validator: CaptureValidator,
    stream_config: StreamConfig,
    /// ストリーミングループへの協調的取消シグナル
    cancel: Arc<AtomicBool>,
    /// ワーカースレッドの完了ハンドル（stop/closeがjoinする）
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<E: CaptureEnginePort + 'static> CaptureSession<E> {
    /// 新しいセッションを作成（デバイスは閉じた状態）
    pub fn new(
        engine: E,
        sink: Arc<dyn NotificationSink>,
        validator: CaptureValidator,
        stream_config: StreamConfig,
    ) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            state: SessionState::new(),
            sink,
            validator,
            stream_config,
            cancel: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// セッション状態への参照を取得
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// デバイスとの接続を開く
    ///
    /// エンジンが失敗した場合は状態を変えずにエラーを返す。
    /// 既に開いている状態での再openの結果はエンジン依存（状態は壊れない）。
    pub fn open(&self) -> ScanResult<()> {
        {
            let mut engine = self.engine.lock().unwrap();
            engine.open()?;
        }
        self.state.set_device_open(true);
        tracing::info!("Capture device opened");
        Ok(())
    }

    /// デバイスとの接続を閉じる
    ///
    /// 先にストリーミングループを停止・joinしてからエンジンのcloseを発行する。
    /// エンジンのcloseが失敗した場合、デバイスは開いたままとみなされる。
    pub fn close(&self) -> ScanResult<()> {
        self.stop_streaming();

        {
            let mut engine = self.engine.lock().unwrap();
            engine.close()?;
        }
        self.state.set_device_open(false);
        tracing::info!("Capture device closed");
        Ok(())
    }

    /// 生フレームを1枚キャプチャする
    ///
    /// 寸法検証はデバイスに触れる前に行う（fail fast）。
    /// 構造的に空のバッファは警告ログのみでエラーにはしない。
    pub fn capture_single(&self, width: u32, height: u32) -> ScanResult<Frame> {
        self.validator.validate_dimensions(width, height)?;

        if !self.state.is_device_open() {
            return Err(ScanError::NotOpen);
        }

        let data = {
            let mut engine = self.engine.lock().unwrap();
            engine.set_capture_window(0, 0, width, height)?;
            engine.get_frame(width, height)?
        };

        self.validator
            .validate_buffer(&data, (width * height) as usize)?;

        if !self.validator.has_valid_data(&data) {
            tracing::warn!(
                "Captured frame looks structurally empty ({}x{})",
                width,
                height
            );
        }

        tracing::debug!("Frame captured: {}x{}", width, height);
        Ok(Frame::new(data, width, height))
    }

    /// フレームの指品質スコアを取得する
    pub fn score(&self, frame: &Frame) -> ScanResult<i32> {
        if !self.state.is_device_open() {
            return Err(ScanError::NotOpen);
        }
        let mut engine = self.engine.lock().unwrap();
        engine.score(&frame.data, frame.width, frame.height)
    }

    /// 開いたエンジンに対して1操作を直列実行する
    ///
    /// 分割などエンジンへ直接アクセスする上位フロー用。
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> ScanResult<R>) -> ScanResult<R> {
        if !self.state.is_device_open() {
            return Err(ScanError::NotOpen);
        }
        let mut engine = self.engine.lock().unwrap();
        f(&mut engine)
    }

    /// 指の乾湿タイプを設定する
    pub fn set_finger_condition(&self, condition: FingerCondition) -> ScanResult<()> {
        if !self.state.is_device_open() {
            return Err(ScanError::NotOpen);
        }
        let mut engine = self.engine.lock().unwrap();
        engine.set_finger_dry_wet(condition.to_engine_level())
    }

    /// デバイスのビープ音を鳴らす
    ///
    /// デバイスが閉じている場合は何もしない（エラーにもしない）。
    pub fn beep(&self, times: u32) -> ScanResult<()> {
        if !self.state.is_device_open() {
            return Ok(());
        }
        let mut engine = self.engine.lock().unwrap();
        engine.beep(times)
    }

    /// ストリーミングキャプチャを開始する
    ///
    /// ワーカースレッドを起動して即座に戻る（最初のフレームを待たない）。
    /// 既にストリーミング中の場合は`AlreadyCapturing`で拒否する（キューイングしない）。
    pub fn start_streaming(&self) -> ScanResult<()> {
        if !self.state.is_device_open() {
            return Err(ScanError::NotOpen);
        }

        // workerロックを操作全体で保持し、並行するstop_streamingと直列化する。
        // capturingフラグの更新とスレッド起動・回収は同じロックの下で行うこと
        // （分割すると、capturing=falseのままワーカーが生き残る交錯が存在する）。
        let mut worker = self.worker.lock().unwrap();

        if !self.state.try_begin_capturing() {
            return Err(ScanError::AlreadyCapturing);
        }

        // 以前のループが障害で自己終了している場合、残ったハンドルを回収する。
        // cancelはstop_streamingの完了時に必ず下ろされているため、ここではfalse。
        if let Some(stale) = worker.take() {
            let _ = stale.join();
        }

        let engine = Arc::clone(&self.engine);
        let sink = Arc::clone(&self.sink);
        let state = self.state.clone();
        let cancel = Arc::clone(&self.cancel);
        let config = self.stream_config.clone();

        let handle = std::thread::spawn(move || {
            streaming_worker(engine, sink, state, cancel, config);
        });
        *worker = Some(handle);

        tracing::info!(
            "Streaming capture started: {}x{} every {}ms",
            self.stream_config.width,
            self.stream_config.height,
            self.stream_config.interval_ms
        );
        Ok(())
    }

    /// ストリーミングキャプチャを停止する
    ///
    /// 取消フラグを立て、ワーカーの終了をjoinで待ってから戻る。
    /// ストリーミングしていない場合は何もしない（何度呼んでも安全）。
    pub fn stop_streaming(&self) {
        // start_streamingと同じworkerロックの下で、取消からjoinまでを行う
        let mut worker = self.worker.lock().unwrap();

        self.cancel.store(true, Ordering::Release);
        if let Some(handle) = worker.take() {
            // 実行中のイテレーションが完了するまでブロックする。
            // エンジン呼び出し中の取消割り込みは保証しない。
            let _ = handle.join();
            tracing::info!("Streaming capture stopped");
        }

        self.state.set_capturing(false);
        // cancelはループ停止の合図に限定する。停止完了後は必ず下ろし、
        // trueで観測されるのはこの関数の実行中だけにする
        self.cancel.store(false, Ordering::Release);
    }
}

impl<E: CaptureEnginePort + 'static> Drop for CaptureSession<E> {
    fn drop(&mut self) {
        // セッション破棄時にワーカーを残さない
        self.stop_streaming();
    }
}

/// ストリーミングワーカーのメインループ
///
/// 取消確認 → フレーム取得 → 品質スコア → エンコード → 配信 → 取消確認 →
/// スリープ、の繰り返し。品質が低くてもフレームは配信される
/// （使用可否は下流の消費者が判断する）。
/// ループ中のエンジン障害はループを終了させ、状態をidleへ戻し、
/// `StreamEvent::Fault`として帯域外報告される。
fn streaming_worker<E: CaptureEnginePort>(
    engine: Arc<Mutex<E>>,
    sink: Arc<dyn NotificationSink>,
    state: SessionState,
    cancel: Arc<AtomicBool>,
    config: StreamConfig,
) {
    tracing::info!("Streaming worker started");
    let width = config.width;
    let height = config.height;
    let interval = config.interval();

    loop {
        if cancel.load(Ordering::Acquire) {
            break;
        }

        // エンジンへの呼び出しは1イテレーション分をまとめて直列化する
        let acquired: ScanResult<(Vec<u8>, i32)> = (|| {
            let mut guard = engine.lock().unwrap();
            guard.set_capture_window(0, 0, width, height)?;
            let data = guard.get_frame(width, height)?;
            let quality = guard.score(&data, width, height)?;
            Ok((data, quality))
        })();

        match acquired {
            Ok((data, quality)) => {
                let payload = FramePayload {
                    image: encode::raw_to_data_uri(&data, width, height),
                    quality,
                    width,
                    height,
                    timestamp_ms: unix_millis(),
                };
                tracing::debug!("Publishing frame (quality={})", quality);
                sink.publish(StreamEvent::Frame(payload));
            }
            Err(e) => {
                tracing::error!("Streaming capture fault: {}", e);
                sink.publish(StreamEvent::Fault {
                    message: e.to_string(),
                });
                state.set_capturing(false);
                break;
            }
        }

        // ブロッキング呼び出しの後にも取消を確認してから眠る
        if cancel.load(Ordering::Acquire) {
            break;
        }
        std::thread::sleep(interval);
    }

    tracing::info!("Streaming worker exited");
}

/// UNIXエポックからの経過ミリ秒
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::channel_sink::ChannelNotificationSink;
    use crate::infrastructure::mock_engine::MockEngineAdapter;

    fn test_session(
        engine: MockEngineAdapter,
    ) -> (CaptureSession<MockEngineAdapter>, crossbeam_channel::Receiver<StreamEvent>) {
        let (sink, rx) = ChannelNotificationSink::bounded(64);
        let stream_config = StreamConfig {
            width: 320,
            height: 240,
            interval_ms: 5,
            sink_capacity: 64,
        };
        let session = CaptureSession::new(
            engine,
            Arc::new(sink),
            CaptureValidator::default(),
            stream_config,
        );
        (session, rx)
    }

    #[test]
    fn test_capture_single_requires_open_device() {
        let (session, _rx) = test_session(MockEngineAdapter::new());
        assert!(matches!(
            session.capture_single(320, 240),
            Err(ScanError::NotOpen)
        ));
    }

    #[test]
    fn test_capture_single_validates_before_device_state() {
        // 検証はNotOpen判定より先に走る（デバイスに触れる前のfail fast）
        let (session, _rx) = test_session(MockEngineAdapter::new());
        assert!(matches!(
            session.capture_single(10, 240),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_open_and_capture_single() {
        let (session, _rx) = test_session(MockEngineAdapter::new());
        session.open().unwrap();
        assert!(session.state().is_device_open());

        let frame = session.capture_single(320, 240).unwrap();
        assert_eq!(frame.data.len(), 320 * 240);
        assert_eq!(frame.width, 320);

        let quality = session.score(&frame).unwrap();
        assert_eq!(quality, MockEngineAdapter::DEFAULT_SCORE);
    }

    #[test]
    fn test_open_failure_leaves_state_closed() {
        let (session, _rx) = test_session(MockEngineAdapter::new().with_open_failure());
        assert!(matches!(
            session.open(),
            Err(ScanError::Engine { op: "open", .. })
        ));
        assert!(!session.state().is_device_open());
    }

    #[test]
    fn test_close_failure_keeps_device_open() {
        let (session, _rx) = test_session(MockEngineAdapter::new().with_close_failure());
        session.open().unwrap();
        assert!(session.close().is_err());
        assert!(session.state().is_device_open());
    }

    #[test]
    fn test_streaming_requires_open_device() {
        let (session, _rx) = test_session(MockEngineAdapter::new());
        assert!(matches!(
            session.start_streaming(),
            Err(ScanError::NotOpen)
        ));
    }

    #[test]
    fn test_stop_streaming_is_noop_when_idle() {
        let (session, _rx) = test_session(MockEngineAdapter::new());
        session.stop_streaming();
        session.stop_streaming();
        assert!(!session.state().is_capturing());
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (session, _rx) = test_session(MockEngineAdapter::new());
        session.open().unwrap();
        session.start_streaming().unwrap();
        assert!(matches!(
            session.start_streaming(),
            Err(ScanError::AlreadyCapturing)
        ));
        assert!(session.state().is_capturing());
        session.stop_streaming();
    }

    #[test]
    fn test_stop_before_start_does_not_block_next_stream() {
        let (session, rx) = test_session(MockEngineAdapter::new());
        session.open().unwrap();

        // no-opのstopを挟んでもcancelフラグが残留せず、次のstartは配信する
        session.stop_streaming();
        session.start_streaming().unwrap();
        assert!(rx
            .recv_timeout(std::time::Duration::from_secs(2))
            .is_ok());
        session.stop_streaming();
    }

    #[test]
    fn test_concurrent_start_stop_keeps_state_consistent() {
        use std::sync::Barrier;
        use std::time::Duration;

        let engine = MockEngineAdapter::new();
        let frames = engine.frames_served();
        let (session, _rx) = test_session(engine);
        let session = Arc::new(session);
        session.open().unwrap();

        for _ in 0..100 {
            let barrier = Arc::new(Barrier::new(2));

            let starter = {
                let session = Arc::clone(&session);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let _ = session.start_streaming();
                })
            };
            let stopper = {
                let session = Arc::clone(&session);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    session.stop_streaming();
                })
            };
            starter.join().unwrap();
            stopper.join().unwrap();

            // どの交錯順でも、stop完了後にワーカーが生き残っていないこと
            session.stop_streaming();
            assert!(!session.state().is_capturing());
            let served = frames.load(std::sync::atomic::Ordering::Relaxed);
            std::thread::sleep(Duration::from_millis(5));
            assert_eq!(
                frames.load(std::sync::atomic::Ordering::Relaxed),
                served,
                "worker must not survive a completed stop"
            );
        }

        // 競合の後も次のstartがブロックせずに動くこと
        session.start_streaming().unwrap();
        session.stop_streaming();
        session.close().unwrap();
    }

    #[test]
    fn test_beep_is_silent_when_closed() {
        let (session, _rx) = test_session(MockEngineAdapter::new());
        // 閉じた状態のbeepはno-op
        assert!(session.beep(2).is_ok());
    }

    #[test]
    fn test_set_finger_condition_requires_open() {
        let (session, _rx) = test_session(MockEngineAdapter::new());
        assert!(matches!(
            session.set_finger_condition(FingerCondition::Dry),
            Err(ScanError::NotOpen)
        ));
        session.open().unwrap();
        session.set_finger_condition(FingerCondition::Dry).unwrap();
    }
}
