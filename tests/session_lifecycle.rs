//! セッションライフサイクル統合テスト
//!
//! モックエンジンとチャネルシンクで、ストリーミングの開始・停止・障害時の
//! 状態遷移と配信順序を端から端まで検証する。

use tenprint::application::session::CaptureSession;
use tenprint::application::validator::CaptureValidator;
use tenprint::domain::config::StreamConfig;
use tenprint::domain::error::ScanError;
use tenprint::domain::types::StreamEvent;
use tenprint::infrastructure::channel_sink::ChannelNotificationSink;
use tenprint::infrastructure::mock_engine::MockEngineAdapter;

use std::sync::Arc;
use std::time::Duration;

/// テスト用の短周期ストリーム設定
fn fast_stream_config() -> StreamConfig {
    StreamConfig {
        width: 320,
        height: 240,
        interval_ms: 5,
        sink_capacity: 64,
    }
}

fn session_with(
    engine: MockEngineAdapter,
) -> (
    Arc<CaptureSession<MockEngineAdapter>>,
    crossbeam_channel::Receiver<StreamEvent>,
) {
    let (sink, rx) = ChannelNotificationSink::bounded(64);
    let session = Arc::new(CaptureSession::new(
        engine,
        Arc::new(sink),
        CaptureValidator::default(),
        fast_stream_config(),
    ));
    (session, rx)
}

#[test]
fn test_streaming_publishes_frames_until_stopped() {
    let (session, rx) = session_with(MockEngineAdapter::new().with_score(42));
    session.open().unwrap();
    session.start_streaming().unwrap();
    assert!(session.state().is_capturing());

    // 少なくとも3フレーム受信できること
    for _ in 0..3 {
        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            StreamEvent::Frame(payload) => {
                assert_eq!(payload.quality, 42);
                assert_eq!(payload.width, 320);
                assert!(payload.image.starts_with("data:image/bmp;base64,"));
            }
            StreamEvent::Fault { message } => panic!("unexpected fault: {}", message),
        }
    }

    session.stop_streaming();
    assert!(!session.state().is_capturing());

    // 停止後の残留イベントを捨てた後、新たな配信がないこと
    while rx.try_recv().is_ok() {}
    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());

    session.close().unwrap();
}

#[test]
fn test_double_start_runs_exactly_one_loop() {
    let engine = MockEngineAdapter::new();
    let frames = engine.frames_served();
    let (session, rx) = session_with(engine);
    session.open().unwrap();

    session.start_streaming().unwrap();
    assert!(matches!(
        session.start_streaming(),
        Err(ScanError::AlreadyCapturing)
    ));

    // 最初のループは影響を受けず動き続ける
    assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    session.stop_streaming();

    let served_at_stop = frames.load(std::sync::atomic::Ordering::Relaxed);
    std::thread::sleep(Duration::from_millis(50));
    // 停止後にフレームが増えていなければループは1本だけだった
    assert_eq!(
        frames.load(std::sync::atomic::Ordering::Relaxed),
        served_at_stop
    );
}

#[test]
fn test_streaming_fault_reports_and_returns_to_idle() {
    let (session, rx) = session_with(MockEngineAdapter::new().with_frame_fault_after(2));
    session.open().unwrap();
    session.start_streaming().unwrap();

    let mut frames = 0;
    loop {
        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            StreamEvent::Frame(_) => frames += 1,
            StreamEvent::Fault { message } => {
                assert!(message.contains("get_frame"));
                break;
            }
        }
    }
    assert_eq!(frames, 2);

    // ループは自己終了し、セッションはidleへ戻る（デバイスは開いたまま）
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while session.state().is_capturing() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!session.state().is_capturing());
    assert!(session.state().is_device_open());

    // 障害後も再startできる（モックは再び2フレームで落ちる前提ではなく、
    // 既にカウンタが上限超過なので即Faultになる）
    session.start_streaming().unwrap();
    loop {
        if let StreamEvent::Fault { .. } = rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            break;
        }
    }
    session.stop_streaming();
}

#[test]
fn test_close_while_streaming_joins_loop_first() {
    let (session, rx) = session_with(MockEngineAdapter::new());
    session.open().unwrap();
    session.start_streaming().unwrap();

    // ループが動き始めるのを確認してから閉じる
    assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    session.close().unwrap();

    assert!(!session.state().is_capturing());
    assert!(!session.state().is_device_open());

    // close後に新たな配信がないこと（closeされたエンジンへの呼び出しもない）
    while rx.try_recv().is_ok() {}
    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_streaming_restarts_after_stop() {
    let (session, rx) = session_with(MockEngineAdapter::new());
    session.open().unwrap();

    session.start_streaming().unwrap();
    assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    session.stop_streaming();

    session.start_streaming().unwrap();
    assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    session.stop_streaming();
    session.close().unwrap();
}

#[test]
fn test_capture_single_while_streaming_is_serialized() {
    // ストリーミング中の単発キャプチャはエンジンロックで直列化され、両立する
    let (session, rx) = session_with(MockEngineAdapter::new());
    session.open().unwrap();
    session.start_streaming().unwrap();

    let frame = session.capture_single(300, 400).unwrap();
    assert_eq!(frame.data.len(), 300 * 400);

    assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    session.stop_streaming();
    session.close().unwrap();
}
