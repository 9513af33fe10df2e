use crate::application::ports::{Notification, NotificationLevel, Notifier};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// トーストをUI側のチャンネルに流す
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("notification receiver dropped");
        }
    }
}

/// 受け手がいない環境ではログに出すだけ
#[derive(Clone, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message.unwrap_or_default();
        match notification.level {
            NotificationLevel::Success | NotificationLevel::Info => {
                info!(title = %notification.title, %message, "notification")
            }
            NotificationLevel::Error => {
                error!(title = %notification.title, %message, "notification")
            }
        }
    }
}
