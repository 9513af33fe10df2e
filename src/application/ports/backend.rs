use crate::domain::entities::{
    AuthUser, NewObservation, NewTerritory, Observation, PendingChange, Session, Territory,
    TerritoryStatusPatch, UserAccount,
};
use crate::domain::value_objects::{ObservationId, PolygonRing, Role, TerritoryId, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// `territorios` テーブルへのアクセス
#[async_trait]
pub trait TerritoryGateway: Send + Sync {
    /// 番号の昇順で全件取得
    async fn list_territories(&self) -> Result<Vec<Territory>, AppError>;
    async fn create_territory(&self, draft: &NewTerritory) -> Result<Territory, AppError>;
    async fn update_territory_status(
        &self,
        id: &TerritoryId,
        patch: &TerritoryStatusPatch,
    ) -> Result<Territory, AppError>;
    async fn update_completed_edges(
        &self,
        id: &TerritoryId,
        edges: &BTreeSet<u32>,
    ) -> Result<Territory, AppError>;
    /// リングを差し替え、完了済みの辺をリセットする
    async fn update_territory_geometry(
        &self,
        id: &TerritoryId,
        ring: &PolygonRing,
    ) -> Result<Territory, AppError>;
    /// 存在しないIDの場合は `AppError::NotFound`
    async fn delete_territory(&self, id: &TerritoryId) -> Result<(), AppError>;
}

/// `observaciones` テーブルへのアクセス
#[async_trait]
pub trait ObservationGateway: Send + Sync {
    /// 新しい順。`territory_id` 指定時はその領域のみ
    async fn list_observations(
        &self,
        territory_id: Option<TerritoryId>,
    ) -> Result<Vec<Observation>, AppError>;
    async fn create_observation(&self, draft: &NewObservation) -> Result<Observation, AppError>;
    async fn update_observation(
        &self,
        id: &ObservationId,
        comentario: &str,
    ) -> Result<Observation, AppError>;
    async fn delete_observation(&self, id: &ObservationId) -> Result<(), AppError>;
}

/// ロール判定とユーザー管理（`user_roles` / `profiles` と RPC）
#[async_trait]
pub trait UserGateway: Send + Sync {
    async fn is_admin(&self) -> Result<bool, AppError>;
    async fn list_users(&self) -> Result<Vec<UserAccount>, AppError>;
    async fn update_user_role(&self, user_id: &UserId, role: Role) -> Result<(), AppError>;
    async fn delete_user(&self, user_id: &UserId) -> Result<(), AppError>;
}

/// オフラインキューの再送
#[async_trait]
pub trait ChangeReplayGateway: Send + Sync {
    async fn apply_pending_change(&self, change: &PendingChange) -> Result<(), AppError>;
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;
    /// メール確認が必要な場合は `None`
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<Option<Session>, AppError>;
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;
}
