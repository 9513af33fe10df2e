use tokio::sync::watch;

/// 端末が今ネットワークに繋がっているか
pub trait ConnectivityMonitor: Send + Sync {
    fn is_online(&self) -> bool;
    fn subscribe(&self) -> watch::Receiver<bool>;
}
