use crate::shared::error::AppError;
use async_trait::async_trait;

/// 端末ローカルのキー・バリューストア
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    async fn remove(&self, key: &str) -> Result<(), AppError>;
    async fn keys(&self) -> Result<Vec<String>, AppError>;
}
