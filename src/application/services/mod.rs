pub mod auth_service;
pub mod map_service;
pub mod observation_service;
pub mod offline_service;
mod optimistic;
pub mod sync_service;
pub mod territory_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use map_service::MapController;
pub use observation_service::ObservationService;
pub use offline_service::OfflineService;
pub use optimistic::OptimisticUpdate;
pub use sync_service::SyncService;
pub use territory_service::TerritoryService;
pub use user_service::UserService;
