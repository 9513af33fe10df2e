use crate::infrastructure::cache::QueryCache;
use std::sync::Arc;
use tracing::debug;

/// キャッシュへの楽観的更新。適用前のスナップショットを保持し、
/// サーバー応答に応じて確定またはロールバックする
pub struct OptimisticUpdate<T: Clone + Send + Sync + 'static> {
    cache: Arc<QueryCache<T>>,
    key: String,
    snapshot: Option<T>,
    applied: bool,
}

impl<T> OptimisticUpdate<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `f` をキャッシュ済みデータに適用する。データがなければ何もしない
    pub async fn apply<F>(cache: Arc<QueryCache<T>>, key: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(&mut T),
    {
        let key = key.into();
        let snapshot = cache.peek(&key).await;
        let applied = cache.update_data(&key, f).await;
        debug!(key = %key, applied, "optimistic update applied");
        Self {
            cache,
            key,
            snapshot,
            applied,
        }
    }

    pub fn was_applied(&self) -> bool {
        self.applied
    }

    pub fn snapshot(&self) -> Option<&T> {
        self.snapshot.as_ref()
    }

    /// 現在のキャッシュ値（楽観値）を返す
    pub async fn current(&self) -> Option<T> {
        self.cache.peek(&self.key).await
    }

    /// 楽観値をそのまま確定する
    pub fn confirm(self) {
        debug!(key = %self.key, "optimistic update confirmed");
    }

    /// サーバーの値で上書きして確定する
    pub async fn confirm_with<F>(self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.cache.update_data(&self.key, f).await;
        debug!(key = %self.key, "optimistic update confirmed with server value");
    }

    /// スナップショットに戻す
    pub async fn rollback(self) {
        if self.applied {
            self.cache.restore(&self.key, self.snapshot).await;
            debug!(key = %self.key, "optimistic update rolled back");
        }
    }
}
