//! ログ基盤
//!
//! tracingによる統一的なログ出力。ファイル出力時はtracing-appenderの
//! 非同期ライタを使い、キャプチャループへの影響を最小化する。
//! `RUST_LOG`環境変数が設定されていればそちらを優先する。

use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログシステムを初期化する
///
/// # Arguments
/// - `log_level`: 既定のログレベル（"info", "debug"等。`RUST_LOG`があれば無視）
/// - `json_format`: JSON形式で出力するか
/// - `log_dir`: ログファイル出力先（None = 標準出力）
///
/// # Returns
/// ファイル出力時は`Some(WorkerGuard)`。main終了まで保持しないと
/// バッファ済みログが失われる。標準出力時と初期化済みの場合は`None`。
pub fn init_logging(
    log_level: &str,
    json_format: bool,
    log_dir: Option<PathBuf>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir).expect("Failed to create log directory");

            let file_appender = tracing_appender::rolling::daily(dir, "tenprint.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let subscriber = tracing_subscriber::registry().with(env_filter);

            let result = if json_format {
                subscriber
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .try_init()
            } else {
                subscriber
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_ansi(false) // ファイル出力時はANSIエスケープ無効
                            .with_writer(non_blocking),
                    )
                    .try_init()
            };

            if result.is_err() {
                return None;
            }

            tracing::info!("Logging initialized (async file): level={}", log_level);
            Some(guard)
        }
        None => {
            let subscriber = tracing_subscriber::registry().with(env_filter);

            let result = if json_format {
                subscriber.with(fmt::layer().json()).try_init()
            } else {
                subscriber
                    .with(fmt::layer().with_target(true).with_thread_ids(true))
                    .try_init()
            };

            if result.is_ok() {
                tracing::info!("Logging initialized (stdout): level={}", log_level);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_stdout() {
        // 標準出力モード。二重初期化してもパニックしないこと
        init_logging("debug", false, None);
        init_logging("debug", false, None);
        tracing::info!("Test log message");
    }

    #[test]
    fn test_init_logging_file() {
        let temp_dir = std::env::temp_dir().join("tenprint_test_logs");

        let guard = init_logging("info", false, Some(temp_dir.clone()));
        if guard.is_none() {
            // グローバルsubscriberが他のテストで設定済み - スキップ
            return;
        }

        assert!(temp_dir.exists());
        tracing::info!("Test file log");
        drop(guard);

        let log_files: Vec<_> = std::fs::read_dir(&temp_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(!log_files.is_empty(), "Log file should be created");

        std::fs::remove_dir_all(temp_dir).ok();
    }
}
