pub mod ports;
pub mod services;

pub use services::{
    AuthService,
    ObservationService,
    OfflineService,
    SyncService,
    TerritoryService,
    UserService,
};
