use tenprint::application::flows::{CaptureFlows, DetectHandOutcome};
use tenprint::application::segmentation::SegmentationAdapter;
use tenprint::application::session::CaptureSession;
use tenprint::application::validator::CaptureValidator;
use tenprint::domain::config::AppConfig;
use tenprint::domain::types::StreamEvent;
use tenprint::infrastructure::channel_sink::ChannelNotificationSink;
use tenprint::infrastructure::mock_engine::MockEngineAdapter;
use tenprint::logging::init_logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    // ログシステムの初期化（非同期ファイル出力）
    let log_dir = PathBuf::from("logs");
    let _guard = init_logging("info", false, Some(log_dir));
    // 注意: _guardはmain終了まで保持する必要がある（Dropでログスレッドが終了）

    tracing::info!("tenprint starting...");

    match run() {
        Ok(_) => {
            tracing::info!("tenprint terminated gracefully.");
        }
        Err(e) => {
            tracing::error!("Fatal error: {:?}", e);
            std::process::exit(1);
        }
    }
}

/// アプリケーションのメイン処理
///
/// 実機ドライバ未接続のため、モックエンジンでストリーミングと
/// 左右判定フローを一巡するデモ実行。
fn run() -> anyhow::Result<()> {
    // 設定ファイルの読み込み（存在しない場合はデフォルト設定を使用）
    let config = match AppConfig::from_file("config.toml") {
        Ok(config) => {
            tracing::info!("Loaded configuration from config.toml");
            config
        }
        Err(e) => {
            tracing::warn!("Failed to load config.toml: {:?}, using defaults", e);
            AppConfig::default()
        }
    };

    config.validate()?;

    tracing::info!("Configuration validated successfully");
    tracing::info!(
        "Device: frame={}x{}, single={}x{}",
        config.device.frame_width,
        config.device.frame_height,
        config.device.single_width,
        config.device.single_height
    );
    tracing::info!(
        "Stream: {}x{} every {}ms, sink capacity {}",
        config.stream.width,
        config.stream.height,
        config.stream.interval_ms,
        config.stream.sink_capacity
    );

    // モックエンジンの初期化（両親指レイアウトの台本付き）
    tracing::info!("Initializing mock capture engine...");
    let engine = MockEngineAdapter::new().with_score(65).with_fingers(vec![
        tenprint::domain::ports::SegmentMeta {
            x: 500,
            y: 700,
            top: 500,
            left: 350,
            angle: 45,
            quality: 72,
        },
        tenprint::domain::ports::SegmentMeta {
            x: 1100,
            y: 700,
            top: 500,
            left: 950,
            angle: 315,
            quality: 68,
        },
    ]);

    let (sink, events) = ChannelNotificationSink::bounded(config.stream.sink_capacity);
    let validator = CaptureValidator::new(config.validator.clone());

    let session = Arc::new(CaptureSession::new(
        engine,
        Arc::new(sink),
        validator.clone(),
        config.stream.clone(),
    ));

    let flows = CaptureFlows::new(
        Arc::clone(&session),
        SegmentationAdapter::new(config.segmentation.clone()),
        validator,
        config.device.clone(),
        config.quality.clone(),
    );

    session.open()?;
    session.set_finger_condition(config.device.finger_condition)?;

    // ライブプレビューを数フレームぶん流す
    session.start_streaming()?;
    let preview_deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < preview_deadline {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(StreamEvent::Frame(payload)) => {
                tracing::info!(
                    "Preview frame: quality={}, {} bytes encoded",
                    payload.quality,
                    payload.image.len()
                );
            }
            Ok(StreamEvent::Fault { message }) => {
                tracing::error!("Streaming fault: {}", message);
                break;
            }
            Err(_) => break,
        }
    }
    session.stop_streaming();

    // 左右判定フロー
    match flows.detect_hand()? {
        DetectHandOutcome::Detected {
            quality,
            finger_count,
            classification,
        } => {
            tracing::info!(
                "Hand: {} (confidence={:.2}, fingers={}, quality={}): {}",
                classification.hand_type.description(),
                classification.confidence,
                finger_count,
                quality,
                classification.reason
            );
        }
        DetectHandOutcome::NoFingers { quality } => {
            tracing::info!("No fingers on the platen (quality={})", quality);
        }
        DetectHandOutcome::InsufficientQuality { quality } => {
            tracing::info!("Frame quality too low for detection: {}", quality);
        }
    }

    session.close()?;
    Ok(())
}
