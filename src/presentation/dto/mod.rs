// DTOモジュール
pub mod auth_dto;
pub mod observation_dto;
pub mod sync_dto;
pub mod territory_dto;
pub mod user_dto;

// 共通のレスポンス型
use crate::shared::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub error_details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
            error_details: None,
        }
    }

    pub fn from_app_error(error: AppError) -> Self {
        let error_details = match &error {
            AppError::ValidationError { kind, .. } => Some(json!({ "kind": kind.as_str() })),
            AppError::Backend { status, .. } => Some(json!({ "status": status })),
            _ => None,
        };

        Self {
            success: false,
            data: None,
            error: Some(error.user_message()),
            error_code: Some(error.code().to_string()),
            error_details,
        }
    }

    pub fn from_result(result: crate::shared::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::from_app_error(err),
        }
    }
}

// バリデーショントレイト
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ValidationFailureKind;

    #[test]
    fn validation_errors_carry_their_kind() {
        let response: ApiResponse<()> = ApiResponse::from_app_error(AppError::validation(
            ValidationFailureKind::DuplicateNumber,
            "Ya existe un territorio con el número 12",
        ));
        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("validation"));
        assert_eq!(
            response.error.as_deref(),
            Some("Ya existe un territorio con el número 12")
        );
        assert_eq!(response.error_details.unwrap()["kind"], "duplicate_number");
    }

    #[test]
    fn ok_results_become_success() {
        let response = ApiResponse::from_result(Ok(3u32));
        assert!(response.success);
        assert_eq!(response.data, Some(3));
        assert!(response.error.is_none());
    }
}
