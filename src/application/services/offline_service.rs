use super::sync_service::{InFlightGuard, SyncParticipant};
use crate::application::ports::{ChangeReplayGateway, ConnectivityMonitor};
use crate::domain::entities::PendingChange;
use crate::domain::value_objects::ChangeKind;
use crate::infrastructure::storage::{PrefixedStore, PENDING_CHANGES_KEY};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// 1回の再送の結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub applied: u32,
    pub dropped: u32,
    pub retained: u32,
    /// 通信エラーで途中終了した
    pub aborted: bool,
    /// 別の再送が実行中だったため何もしなかった
    pub skipped: bool,
}

/// オフラインキュー。ローカルストアの `pending_changes` を丸ごと読み書きする
pub struct OfflineService {
    store: PrefixedStore,
    replay_gateway: Arc<dyn ChangeReplayGateway>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    max_retry: u32,
    queue_lock: Mutex<()>,
    replaying: AtomicBool,
}

impl OfflineService {
    pub fn new(
        store: PrefixedStore,
        replay_gateway: Arc<dyn ChangeReplayGateway>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        max_retry: u32,
    ) -> Self {
        Self {
            store,
            replay_gateway,
            connectivity,
            max_retry: max_retry.max(1),
            queue_lock: Mutex::new(()),
            replaying: AtomicBool::new(false),
        }
    }

    /// 通信失敗かつオフラインのときだけキューに回す
    pub fn should_queue(&self, err: &AppError) -> bool {
        err.is_transport() && !self.connectivity.is_online()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    async fn load(&self) -> Result<Vec<PendingChange>, AppError> {
        let mut queue: Vec<PendingChange> = self
            .store
            .get_json(PENDING_CHANGES_KEY)
            .await?
            .unwrap_or_default();
        queue.sort_by_key(|c| c.timestamp);
        Ok(queue)
    }

    async fn save(&self, queue: &[PendingChange]) -> Result<(), AppError> {
        if queue.is_empty() {
            self.store.remove(PENDING_CHANGES_KEY).await
        } else {
            self.store.set_json(PENDING_CHANGES_KEY, queue).await
        }
    }

    /// キュー全体をロックしたまま書き換える
    async fn modify<R, F>(&self, f: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut Vec<PendingChange>) -> R + Send,
        R: Send,
    {
        let _guard = self.queue_lock.lock().await;
        let mut queue = self.load().await?;
        let result = f(&mut queue);
        self.save(&queue).await?;
        Ok(result)
    }

    pub async fn enqueue(
        &self,
        kind: ChangeKind,
        table: &str,
        data: Value,
    ) -> Result<PendingChange, AppError> {
        let change = PendingChange::new(kind, table, data);
        let queued = change.clone();
        self.modify(move |queue| queue.push(queued)).await?;
        info!(change_id = %change.id, table, kind = ?kind, "change queued for sync");
        Ok(change)
    }

    /// 送信待ちの変更（追加順）
    pub async fn pending_changes(&self) -> Result<Vec<PendingChange>, AppError> {
        let _guard = self.queue_lock.lock().await;
        self.load().await
    }

    pub async fn pending_count(&self) -> Result<u32, AppError> {
        Ok(self.pending_changes().await?.len() as u32)
    }

    /// まだ送信していない変更のデータを書き換える
    pub async fn update_queued<F>(
        &self,
        change_id: &str,
        f: F,
    ) -> Result<Option<PendingChange>, AppError>
    where
        F: FnOnce(&mut Value) + Send,
    {
        self.modify(|queue| {
            queue.iter_mut().find(|c| c.id == change_id).map(|change| {
                f(&mut change.data);
                change.clone()
            })
        })
        .await
    }

    /// 送信待ちの変更を取り消す
    pub async fn remove(&self, change_id: &str) -> Result<bool, AppError> {
        self.modify(|queue| {
            let before = queue.len();
            queue.retain(|c| c.id != change_id);
            queue.len() != before
        })
        .await
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        let _guard = self.queue_lock.lock().await;
        self.store.remove(PENDING_CHANGES_KEY).await
    }

    /// 追加順に1件ずつ再送する
    ///
    /// - 成功: キューから削除
    /// - 対象なし・競合: 警告を出して破棄（サーバー優先）
    /// - 通信エラー: 残りを保持したまま中断
    /// - その他: 試行回数を増やし、上限に達したら破棄
    pub async fn replay(&self) -> Result<ReplayReport, AppError> {
        let Some(_in_flight) = InFlightGuard::acquire(&self.replaying) else {
            return Ok(ReplayReport {
                skipped: true,
                ..ReplayReport::default()
            });
        };

        self.replay_inner().await
    }

    async fn replay_inner(&self) -> Result<ReplayReport, AppError> {
        let snapshot = self.pending_changes().await?;
        let mut report = ReplayReport::default();

        for change in snapshot {
            match self.replay_gateway.apply_pending_change(&change).await {
                Ok(()) => {
                    self.remove(&change.id).await?;
                    report.applied += 1;
                }
                Err(e) if e.is_transport() => {
                    warn!(change_id = %change.id, error = %e, "replay aborted, still offline");
                    report.aborted = true;
                    break;
                }
                Err(e) if e.is_conflict() => {
                    warn!(change_id = %change.id, error = %e, "dropping change rejected by server state");
                    self.remove(&change.id).await?;
                    report.dropped += 1;
                }
                Err(e) => {
                    let attempts = change.attempts + 1;
                    if attempts >= self.max_retry {
                        error!(change_id = %change.id, attempts, error = %e, "dropping change after max retries");
                        self.remove(&change.id).await?;
                        report.dropped += 1;
                    } else {
                        warn!(change_id = %change.id, attempts, error = %e, "replay failed, will retry");
                        let id = change.id.clone();
                        self.modify(move |queue| {
                            if let Some(entry) = queue.iter_mut().find(|c| c.id == id) {
                                entry.attempts = attempts;
                            }
                        })
                        .await?;
                        report.retained += 1;
                    }
                }
            }
        }

        if report.aborted {
            let remaining = self.pending_count().await?;
            report.retained = remaining;
        }

        info!(
            applied = report.applied,
            dropped = report.dropped,
            retained = report.retained,
            aborted = report.aborted,
            "offline replay finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl SyncParticipant for OfflineService {
    async fn sync_pending(&self) -> Result<u32, AppError> {
        Ok(self.replay().await?.applied)
    }

    async fn pending_count(&self) -> Result<u32, AppError> {
        OfflineService::pending_count(self).await
    }
}
