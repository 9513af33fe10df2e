pub mod auth_handler;
pub mod observation_handler;
pub mod sync_handler;
pub mod territory_handler;
pub mod user_handler;

pub use auth_handler::AuthHandler;
pub use observation_handler::ObservationHandler;
pub use sync_handler::SyncHandler;
pub use territory_handler::TerritoryHandler;
pub use user_handler::UserHandler;

use crate::shared::error::AppError;
use super::dto::Validate;

/// 入力検証を実行
pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input.validate().map_err(AppError::InvalidInput)
}
