use crate::domain::entities::AuthUser;
use crate::domain::value_objects::Role;
use std::sync::Arc;
use tokio::sync::RwLock;

/// サービスから見たログイン中の利用者
pub trait CurrentActor: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;
    fn current_role(&self) -> Role;
}

/// 認証サービスと REST クライアントで共有するアクセストークン
#[derive(Clone, Default)]
pub struct SessionToken(Arc<RwLock<Option<String>>>);

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, token: Option<String>) {
        *self.0.write().await = token;
    }

    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }
}
