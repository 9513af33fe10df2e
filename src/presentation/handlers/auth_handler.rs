use super::validate_input;
use crate::{
    application::services::auth_service::{AuthService, Route},
    presentation::dto::auth_dto::{
        AuthStateResponse, RouteResponse, SignInRequest, SignUpRequest,
    },
    shared::error::AppError,
};
use std::sync::Arc;

pub struct AuthHandler {
    auth_service: Arc<AuthService>,
}

impl AuthHandler {
    pub fn new(auth_service: Arc<AuthService>) -> Self {
        Self { auth_service }
    }

    pub async fn initialize(&self) -> AuthStateResponse {
        let state = self.auth_service.initialize().await;
        AuthStateResponse::from(&state)
    }

    pub fn current_state(&self) -> AuthStateResponse {
        AuthStateResponse::from(&self.auth_service.state())
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<RouteResponse, AppError> {
        validate_input(&request)?;
        let route = self
            .auth_service
            .sign_in(&request.email, &request.password)
            .await?;
        Ok(route.into())
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<RouteResponse, AppError> {
        validate_input(&request)?;
        let route = self
            .auth_service
            .sign_up(&request.email, &request.password, request.full_name)
            .await?;
        Ok(route.into())
    }

    pub async fn sign_out(&self) -> RouteResponse {
        self.auth_service.sign_out().await.into()
    }

    /// 画面遷移のガード。読み込み中は `None`
    pub fn guard(&self, path: &str) -> Option<RouteResponse> {
        let requested = if path == Route::Auth.path() {
            Route::Auth
        } else {
            Route::Map
        };
        self.auth_service.guard(requested).map(RouteResponse::from)
    }
}
