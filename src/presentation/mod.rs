pub mod dto;
pub mod handlers;

pub use handlers::{
    AuthHandler, ObservationHandler, SyncHandler, TerritoryHandler, UserHandler,
};
