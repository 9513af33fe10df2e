use super::validate_input;
use crate::{
    application::services::UserService,
    domain::value_objects::UserId,
    presentation::dto::user_dto::{ChangeRoleRequest, DeleteUserRequest, UserResponse},
    shared::{error::AppError, ValidationFailureKind},
};
use std::sync::Arc;

pub struct UserHandler {
    user_service: Arc<UserService>,
}

impl UserHandler {
    pub fn new(user_service: Arc<UserService>) -> Self {
        Self { user_service }
    }

    pub async fn check_is_admin(&self) -> bool {
        self.user_service.check_is_admin().await
    }

    pub async fn list_users(&self) -> Result<Vec<UserResponse>, AppError> {
        let users = self.user_service.list_users().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn change_role(&self, request: ChangeRoleRequest) -> Result<(), AppError> {
        validate_input(&request)?;
        let role = request
            .role()
            .map_err(AppError::validation_mapper(ValidationFailureKind::UnknownValue))?;
        let user_id = UserId::new(request.user_id.trim().to_string()).map_err(AppError::InvalidInput)?;

        self.user_service.change_role(&user_id, role).await
    }

    pub async fn delete_user(&self, request: DeleteUserRequest) -> Result<(), AppError> {
        validate_input(&request)?;
        let user_id = UserId::new(request.user_id.trim().to_string()).map_err(AppError::InvalidInput)?;

        self.user_service.delete_user(&user_id).await
    }
}
