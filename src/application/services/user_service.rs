use crate::application::ports::{CurrentActor, Notification, Notifier, UserGateway};
use crate::domain::entities::UserAccount;
use crate::domain::value_objects::{Role, UserId};
use crate::infrastructure::cache::QueryCache;
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::{error, info};

pub const USERS_KEY: &str = "users";

pub struct UserService {
    gateway: Arc<dyn UserGateway>,
    cache: Arc<QueryCache<Vec<UserAccount>>>,
    actor: Arc<dyn CurrentActor>,
    notifier: Arc<dyn Notifier>,
}

impl UserService {
    pub fn new(
        gateway: Arc<dyn UserGateway>,
        cache: Arc<QueryCache<Vec<UserAccount>>>,
        actor: Arc<dyn CurrentActor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            cache,
            actor,
            notifier,
        }
    }

    /// 判定に失敗した場合は管理者ではないものとして扱う
    pub async fn check_is_admin(&self) -> bool {
        match self.gateway.is_admin().await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                error!(error = %e, "admin check failed");
                false
            }
        }
    }

    fn require_admin(&self) -> Result<(), AppError> {
        if self.actor.current_role().is_admin() {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "Se requiere rol de administrador".to_string(),
            ))
        }
    }

    fn fail(&self, title: &str, err: AppError) -> AppError {
        self.notifier
            .notify(Notification::error(title, err.user_message()));
        err
    }

    pub async fn list_users(&self) -> Result<Vec<UserAccount>, AppError> {
        self.load_users()
            .await
            .map_err(|e| self.fail("Error al cargar usuarios", e))
    }

    /// 通知なしで読む。変更後の再取得用
    async fn load_users(&self) -> Result<Vec<UserAccount>, AppError> {
        self.require_admin()?;
        let gateway = self.gateway.clone();
        self.cache
            .fetch(USERS_KEY, move || async move { gateway.list_users().await })
            .await
    }

    pub async fn change_role(&self, user_id: &UserId, role: Role) -> Result<(), AppError> {
        self.require_admin()
            .map_err(|e| self.fail("Error al actualizar rol", e))?;

        self.gateway
            .update_user_role(user_id, role)
            .await
            .map_err(|e| self.fail("Error al actualizar rol", e))?;

        info!(user_id = %user_id, role = %role, "user role changed");
        self.notifier
            .notify(Notification::success("Rol actualizado"));
        self.refetch().await;
        Ok(())
    }

    pub async fn delete_user(&self, user_id: &UserId) -> Result<(), AppError> {
        self.require_admin()
            .map_err(|e| self.fail("Error al eliminar usuario", e))?;

        let is_self = self
            .actor
            .current_user()
            .map(|user| &user.id == user_id)
            .unwrap_or(false);
        if is_self {
            return Err(self.fail(
                "Error al eliminar usuario",
                AppError::InvalidInput("No puedes eliminar tu propia cuenta".to_string()),
            ));
        }

        self.gateway
            .delete_user(user_id)
            .await
            .map_err(|e| self.fail("Error al eliminar usuario", e))?;

        info!(user_id = %user_id, "user deleted");
        self.notifier
            .notify(Notification::success("Usuario eliminado"));
        self.refetch().await;
        Ok(())
    }

    async fn refetch(&self) {
        self.cache.invalidate(USERS_KEY).await;
        if let Err(e) = self.load_users().await {
            error!(error = %e, "failed to refetch users");
        }
    }

    pub async fn invalidate(&self) {
        self.cache.clear().await;
    }
}
