use crate::application::ports::LocalStore;
use crate::shared::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

pub const TERRITORIES_CACHE_KEY: &str = "territories_cache";
pub const PENDING_CHANGES_KEY: &str = "pending_changes";
pub const SESSION_KEY: &str = "session";

/// アプリ固有のプレフィックスを付けて値をJSONで読み書きする
#[derive(Clone)]
pub struct PrefixedStore {
    inner: Arc<dyn LocalStore>,
    prefix: String,
}

impl PrefixedStore {
    pub fn new(inner: Arc<dyn LocalStore>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// 壊れた値は警告を出して「なし」として扱う
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let full_key = self.full_key(key);
        let Some(raw) = self.inner.get(&full_key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %full_key, error = %e, "discarding unreadable local value");
                Ok(None)
            }
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)?;
        self.inner.set(&self.full_key(key), &raw).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.inner.remove(&self.full_key(key)).await
    }

    /// このプレフィックス配下のキー（プレフィックスなし）
    pub async fn keys(&self) -> Result<Vec<String>, AppError> {
        Ok(self
            .inner
            .keys()
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryLocalStore;

    #[tokio::test]
    async fn keys_are_isolated_by_prefix() {
        let backing: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let ours = PrefixedStore::new(backing.clone(), "territorios_");
        let theirs = PrefixedStore::new(backing.clone(), "otra_");

        ours.set_json(SESSION_KEY, &vec![1, 2]).await.unwrap();
        theirs.set_json(SESSION_KEY, &vec![9]).await.unwrap();

        assert_eq!(
            ours.get_json::<Vec<i32>>(SESSION_KEY).await.unwrap(),
            Some(vec![1, 2])
        );
        assert_eq!(ours.keys().await.unwrap(), vec![SESSION_KEY.to_string()]);
        assert_eq!(
            backing.get("territorios_session").await.unwrap().as_deref(),
            Some("[1,2]")
        );

        ours.remove(SESSION_KEY).await.unwrap();
        assert_eq!(ours.get_json::<Vec<i32>>(SESSION_KEY).await.unwrap(), None);
        assert!(theirs.get_json::<Vec<i32>>(SESSION_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_values_read_as_missing() {
        let backing: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        backing.set("territorios_pending_changes", "{not json").await.unwrap();

        let store = PrefixedStore::new(backing, "territorios_");
        let value: Option<Vec<String>> = store.get_json(PENDING_CHANGES_KEY).await.unwrap();
        assert!(value.is_none());
    }
}
