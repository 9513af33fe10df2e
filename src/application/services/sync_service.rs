use crate::application::ports::ConnectivityMonitor;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[async_trait]
pub trait SyncParticipant: Send + Sync {
    /// 保留中の変更を送信し、適用できた件数を返す
    async fn sync_pending(&self) -> Result<u32, AppError>;
    async fn pending_count(&self) -> Result<u32, AppError>;
}

/// 同期で変更が適用された後にキャッシュを捨てる側
#[async_trait]
pub trait SyncObserver: Send + Sync {
    async fn on_synced(&self, applied: u32);
}

/// 実行中フラグ。future が途中で破棄されても `Drop` で必ず下ろす
pub(crate) struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    /// 既に立っていれば `None`
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub pending_changes: u32,
    pub last_sync: Option<i64>,
    pub last_applied: u32,
    pub sync_errors: u32,
}

pub struct SyncService {
    connectivity: Arc<dyn ConnectivityMonitor>,
    participant: Arc<dyn SyncParticipant>,
    observers: Vec<Arc<dyn SyncObserver>>,
    status: Arc<RwLock<SyncStatus>>,
    syncing: Arc<AtomicBool>,
}

impl SyncService {
    pub fn new(
        connectivity: Arc<dyn ConnectivityMonitor>,
        participant: Arc<dyn SyncParticipant>,
        observers: Vec<Arc<dyn SyncObserver>>,
    ) -> Self {
        Self {
            connectivity,
            participant,
            observers,
            status: Arc::new(RwLock::new(SyncStatus::default())),
            syncing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 保留中の変更を再送する。オフライン中や実行中は何もしない
    pub async fn start_sync(&self) -> Result<u32, AppError> {
        if !self.connectivity.is_online() {
            debug!("skipping sync while offline");
            return Ok(0);
        }

        let Some(_in_flight) = InFlightGuard::acquire(&self.syncing) else {
            return Ok(0);
        };

        let result = self.participant.sync_pending().await;

        let mut status = self.status.write().await;
        match &result {
            Ok(applied) => {
                status.last_sync = Some(chrono::Utc::now().timestamp());
                status.last_applied = *applied;
            }
            Err(_) => status.sync_errors += 1,
        }
        drop(status);

        if let Ok(applied) = &result {
            if *applied > 0 {
                for observer in &self.observers {
                    observer.on_synced(*applied).await;
                }
            }
        }

        result
    }

    pub async fn get_status(&self) -> SyncStatus {
        let mut status = self.status.read().await.clone();
        status.is_online = self.connectivity.is_online();
        status.is_syncing = self.syncing.load(Ordering::SeqCst);
        status.pending_changes = match self.participant.pending_count().await {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "failed to read pending changes");
                status.pending_changes
            }
        };
        status
    }

    pub async fn reset_errors(&self) {
        self.status.write().await.sync_errors = 0;
    }

    /// オフライン→オンラインの遷移ごとに再送を走らせる
    pub fn watch_connectivity(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.connectivity.subscribe();
        tokio::spawn(async move {
            let mut was_online = *rx.borrow_and_update();
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if online && !was_online {
                    info!("connection restored, replaying pending changes");
                    if let Err(e) = self.start_sync().await {
                        error!(error = %e, "sync after reconnect failed");
                    }
                }
                was_online = online;
            }
        })
    }
}

impl Clone for SyncService {
    fn clone(&self) -> Self {
        Self {
            connectivity: self.connectivity.clone(),
            participant: self.participant.clone(),
            observers: self.observers.clone(),
            status: self.status.clone(),
            syncing: self.syncing.clone(),
        }
    }
}
