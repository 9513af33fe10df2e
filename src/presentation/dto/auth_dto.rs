use super::Validate;
use crate::application::services::auth_service::{AuthState, Route};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

impl Validate for SignInRequest {
    fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err("Correo y contraseña son obligatorios".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

impl Validate for SignUpRequest {
    fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err("Correo y contraseña son obligatorios".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthStateResponse {
    /// `loading` / `authenticated` / `unauthenticated` のいずれか
    pub status: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_admin: bool,
}

impl From<&AuthState> for AuthStateResponse {
    fn from(state: &AuthState) -> Self {
        match state {
            AuthState::Loading => Self::without_user("loading"),
            AuthState::Unauthenticated => Self::without_user("unauthenticated"),
            AuthState::Authenticated { session, role } => Self {
                status: "authenticated".to_string(),
                user_id: Some(session.user.id.to_string()),
                email: session.user.email.clone(),
                role: Some(role.as_str().to_string()),
                is_admin: role.is_admin(),
            },
        }
    }
}

impl AuthStateResponse {
    fn without_user(status: &str) -> Self {
        Self {
            status: status.to_string(),
            user_id: None,
            email: None,
            role: None,
            is_admin: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RouteResponse {
    pub path: String,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        Self {
            path: route.path().to_string(),
        }
    }
}
