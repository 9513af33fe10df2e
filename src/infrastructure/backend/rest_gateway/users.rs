use super::{RestGateway, TABLE_PROFILES, TABLE_USER_ROLES};
use crate::application::ports::UserGateway;
use crate::domain::entities::UserAccount;
use crate::domain::value_objects::{Role, UserId};
use crate::infrastructure::backend::rows::{join_accounts, ProfileRow, UpdateRoleParams, UserRoleRow};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::json;

#[async_trait]
impl UserGateway for RestGateway {
    async fn is_admin(&self) -> Result<bool, AppError> {
        let result: Option<bool> = self.client.rpc("is_admin", &json!({})).await?;
        Ok(result.unwrap_or(false))
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>, AppError> {
        let roles: Vec<UserRoleRow> = self
            .client
            .select(TABLE_USER_ROLES, &[("select", "user_id,role".into())])
            .await?;
        let profiles: Vec<ProfileRow> = self
            .client
            .select(TABLE_PROFILES, &[("select", "*".into())])
            .await?;
        Ok(join_accounts(roles, profiles))
    }

    async fn update_user_role(&self, user_id: &UserId, role: Role) -> Result<(), AppError> {
        let _: serde_json::Value = self
            .client
            .rpc(
                "update_user_role",
                &UpdateRoleParams {
                    user_id,
                    new_role: role,
                },
            )
            .await?;
        Ok(())
    }

    /// 認証ユーザー自体は管理APIでしか消せないため、ロールとプロフィールを削除してアクセスを失わせる
    async fn delete_user(&self, user_id: &UserId) -> Result<(), AppError> {
        let removed = self
            .client
            .delete(TABLE_USER_ROLES, "user_id", user_id.as_str())
            .await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("usuario {user_id}")));
        }
        self.client
            .delete(TABLE_PROFILES, "user_id", user_id.as_str())
            .await?;
        Ok(())
    }
}
