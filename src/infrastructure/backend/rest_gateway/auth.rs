use super::RestGateway;
use crate::application::ports::AuthGateway;
use crate::domain::entities::{AuthUser, Session};
use crate::infrastructure::backend::rows::{
    session_from_token, PasswordCredentials, SignUpBody, SignUpMetadata, TokenResponse,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::Value;

#[async_trait]
impl AuthGateway for RestGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let token: TokenResponse = self
            .client
            .auth(
                Method::POST,
                "token",
                &[("grant_type", "password".into())],
                Some(&PasswordCredentials { email, password }),
                None,
            )
            .await?;
        Ok(session_from_token(token, Utc::now()))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<Option<Session>, AppError> {
        let body = SignUpBody {
            email,
            password,
            data: SignUpMetadata { full_name },
        };
        let response: Value = self
            .client
            .auth(Method::POST, "signup", &[], Some(&body), None)
            .await?;

        // メール確認が有効な場合はユーザーだけが返る
        if response.get("access_token").is_none() {
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(response)
            .map_err(|e| AppError::DeserializationError(e.to_string()))?;
        Ok(Some(session_from_token(token, Utc::now())))
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError> {
        self.client
            .auth::<Value, AuthUser>(Method::GET, "user", &[], None, Some(access_token))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        self.client.auth_no_content("logout", access_token).await
    }
}
