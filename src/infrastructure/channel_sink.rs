//! チャネル通知シンク
//!
//! `NotificationSink`のcrossbeam-channel実装。配信はノンブロッキングで、
//! 消費者が追いつかない場合はイベントを黙って破棄する（古いフレームを
//! 待たせるより落とす方がライブプレビューには正しい）。
//! 順序は配信されたイベント間では保存される。

use crate::domain::{NotificationSink, StreamEvent};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// crossbeamチャネルへイベントを流す通知シンク
pub struct ChannelNotificationSink {
    tx: Sender<StreamEvent>,
}

impl ChannelNotificationSink {
    /// 容量付きチャネルとシンクのペアを作成する
    pub fn bounded(capacity: usize) -> (Self, Receiver<StreamEvent>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn publish(&self, event: StreamEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // 消費者が遅い。ワーカーをブロックせずフレームを捨てる
                tracing::debug!("Notification channel full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("Notification channel disconnected, dropping event");
            }
        }
    }
}
