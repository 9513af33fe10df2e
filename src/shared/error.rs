use crate::shared::validation::ValidationFailureKind;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    Database(String),
    Network(String),
    Backend { status: u16, message: String },
    Storage(String),
    Auth(String),
    Unauthorized(String),
    NotFound(String),
    InvalidInput(String),
    ValidationError {
        kind: ValidationFailureKind,
        message: String,
    },
    ConfigurationError(String),
    SerializationError(String),
    DeserializationError(String),
    Internal(String),
}

impl AppError {
    pub fn validation(kind: ValidationFailureKind, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            kind,
            message: message.into(),
        }
    }

    pub fn validation_mapper(kind: ValidationFailureKind) -> impl Fn(String) -> AppError {
        move |message| AppError::validation(kind, message)
    }

    /// 通信自体が失敗した場合（オフライン判定の対象）
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Network(_))
    }

    /// サーバー側で対象が存在しない、または競合した場合
    pub fn is_conflict(&self) -> bool {
        match self {
            AppError::NotFound(_) => true,
            AppError::Backend { status, .. } => matches!(status, 404 | 409 | 410),
            _ => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Network(_) => "network",
            AppError::Backend { .. } => "backend",
            AppError::Storage(_) => "storage",
            AppError::Auth(_) => "auth",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::ValidationError { .. } => "validation",
            AppError::ConfigurationError(_) => "configuration",
            AppError::SerializationError(_) => "serialization",
            AppError::DeserializationError(_) => "deserialization",
            AppError::Internal(_) => "internal",
        }
    }

    /// ユーザーに見せる文言。バックエンドと検証のメッセージはそのまま返す
    pub fn user_message(&self) -> String {
        match self {
            AppError::Backend { message, .. } => message.clone(),
            AppError::ValidationError { message, .. } => message.clone(),
            AppError::InvalidInput(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Auth(msg) => msg.clone(),
            AppError::Network(_) => "No se pudo conectar con el servidor".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Backend { status, message } => {
                write!(f, "Backend error ({}): {}", status, message)
            }
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Auth(msg) => write!(f, "Auth error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::ValidationError { kind, message } => {
                write!(f, "Validation error ({}): {}", kind, message)
            }
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::DeserializationError(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ConfigurationError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
