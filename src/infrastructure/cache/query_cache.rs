use crate::shared::error::AppError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, AppError>>>;

struct QueryEntry<T> {
    data: Option<T>,
    fetched_at: Option<Instant>,
    invalidated: bool,
    in_flight: Option<(u64, SharedFetch<T>)>,
}

impl<T> Default for QueryEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            fetched_at: None,
            invalidated: false,
            in_flight: None,
        }
    }
}

impl<T: Clone> QueryEntry<T> {
    fn fresh_data(&self, stale_time: Duration) -> Option<T> {
        if self.invalidated {
            return None;
        }
        match (&self.data, self.fetched_at) {
            (Some(data), Some(at)) if at.elapsed() < stale_time => Some(data.clone()),
            _ => None,
        }
    }
}

/// 論理キー単位のクエリキャッシュ
///
/// - 取得結果は `stale_time` の間は新鮮とみなす
/// - 同じキーの取得が同時に走った場合は1回のリクエストを共有する
/// - `invalidate` 後の次の読み込みは必ず再取得する
pub struct QueryCache<T: Clone> {
    entries: Mutex<HashMap<String, QueryEntry<T>>>,
    stale_time: Duration,
    next_fetch_id: AtomicU64,
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// 新しいキャッシュを作成
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stale_time,
            next_fetch_id: AtomicU64::new(1),
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    /// 新鮮なデータがあれば返し、なければ `fetcher` で取得する
    pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let (fetch_id, shared) = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(key.to_string()).or_default();

            if let Some(data) = entry.fresh_data(self.stale_time) {
                return Ok(data);
            }

            let existing = entry
                .in_flight
                .as_ref()
                .map(|(id, fetch)| (*id, fetch.clone()));
            match existing {
                Some(in_flight) => {
                    debug!(key, "joining in-flight query");
                    in_flight
                }
                None => {
                    let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                    let fetch = fetcher().boxed().shared();
                    entry.in_flight = Some((id, fetch.clone()));
                    (id, fetch)
                }
            }
        };

        let result = shared.await;

        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            let owns_slot = matches!(&entry.in_flight, Some((id, _)) if *id == fetch_id);
            // invalidate された後に戻ってきた結果は保存しない
            if owns_slot {
                entry.in_flight = None;
                if let Ok(data) = &result {
                    entry.data = Some(data.clone());
                    entry.fetched_at = Some(Instant::now());
                    entry.invalidated = false;
                }
            }
        }

        result
    }

    /// 鮮度に関係なく保持しているデータを返す
    pub async fn peek(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|entry| entry.data.clone())
    }

    pub async fn is_fresh(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .and_then(|entry| entry.fresh_data(self.stale_time))
            .is_some()
    }

    /// データを直接書き込む（新鮮な状態として扱う）
    pub async fn set_data(&self, key: &str, data: T) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_default();
        entry.data = Some(data);
        entry.fetched_at = Some(Instant::now());
        entry.invalidated = false;
    }

    /// 保持データをその場で書き換える。データがなければ `false`
    pub async fn update_data<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key).and_then(|entry| entry.data.as_mut()) {
            Some(data) => {
                f(data);
                true
            }
            None => false,
        }
    }

    /// スナップショットを書き戻す（ロールバック用）。取得時刻は変えない
    pub async fn restore(&self, key: &str, snapshot: Option<T>) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_default();
        entry.data = snapshot;
    }

    /// キーを無効化し、実行中の取得結果も破棄させる
    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.invalidated = true;
            entry.in_flight = None;
        }
    }

    /// プレフィックスに一致するキーを無効化
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().await;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                entry.in_flight = None;
            }
        }
    }

    /// キャッシュをクリア
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
    }

    pub async fn keys(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, AppError>> {
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_request() {
        let cache = QueryCache::<u32>::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.fetch("territories", counting_fetcher(calls.clone(), 1)),
            cache.fetch("territories", counting_fetcher(calls.clone(), 2)),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_data_is_served_without_fetching() {
        let cache = QueryCache::<u32>::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch("k", counting_fetcher(calls.clone(), 7))
            .await
            .unwrap();
        let second = cache
            .fetch("k", counting_fetcher(calls.clone(), 8))
            .await
            .unwrap();

        assert_eq!(second, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_fresh("k").await);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = QueryCache::<u32>::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch("k", counting_fetcher(calls.clone(), 1))
            .await
            .unwrap();
        cache.invalidate("k").await;
        assert!(!cache.is_fresh("k").await);
        assert_eq!(cache.peek("k").await, Some(1));

        let refreshed = cache
            .fetch("k", counting_fetcher(calls.clone(), 2))
            .await
            .unwrap();
        assert_eq!(refreshed, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_stale_time_always_refetches() {
        let cache = QueryCache::<u32>::new(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch("k", counting_fetcher(calls.clone(), 1))
            .await
            .unwrap();
        cache
            .fetch("k", counting_fetcher(calls.clone(), 1))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = QueryCache::<u32>::new(Duration::from_secs(60));

        let failed = cache
            .fetch("k", || async { Err(AppError::Network("offline".into())) })
            .await;
        assert!(failed.is_err());
        assert_eq!(cache.peek("k").await, None);

        let ok = cache.fetch("k", || async { Ok(3) }).await.unwrap();
        assert_eq!(ok, 3);
    }

    #[tokio::test]
    async fn update_and_restore_snapshot() {
        let cache = QueryCache::<Vec<u32>>::new(Duration::from_secs(60));
        cache.set_data("k", vec![1, 2]).await;

        let snapshot = cache.peek("k").await;
        assert!(cache.update_data("k", |v| v.push(3)).await);
        assert_eq!(cache.peek("k").await, Some(vec![1, 2, 3]));

        cache.restore("k", snapshot).await;
        assert_eq!(cache.peek("k").await, Some(vec![1, 2]));
        assert!(!cache.update_data("missing", |v| v.clear()).await);
    }

    #[tokio::test]
    async fn invalidate_prefix_only_touches_matching_keys() {
        let cache = QueryCache::<u32>::new(Duration::from_secs(60));
        cache.set_data("observations:all", 1).await;
        cache.set_data("observations:t1", 2).await;
        cache.set_data("territories", 3).await;

        cache.invalidate_prefix("observations:").await;

        assert!(!cache.is_fresh("observations:all").await);
        assert!(!cache.is_fresh("observations:t1").await);
        assert!(cache.is_fresh("territories").await);
    }
}
