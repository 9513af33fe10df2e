use super::Validate;
use crate::domain::entities::UserAccount;
use crate::domain::value_objects::Role;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserResponse {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub display_name: String,
    pub role: String,
}

impl From<UserAccount> for UserResponse {
    fn from(account: UserAccount) -> Self {
        Self {
            display_name: account.display_name(),
            id: account.id.to_string(),
            email: account.email,
            full_name: account.full_name,
            role: account.role.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangeRoleRequest {
    pub user_id: String,
    pub role: String,
}

impl ChangeRoleRequest {
    pub fn role(&self) -> Result<Role, String> {
        Role::from_str(&self.role)
    }
}

impl Validate for ChangeRoleRequest {
    fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("User ID is required".to_string());
        }
        self.role().map(|_| ())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    pub user_id: String,
}

impl Validate for DeleteUserRequest {
    fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("User ID is required".to_string());
        }
        Ok(())
    }
}
