pub mod entities;
pub mod value_objects;

pub use entities::{Observation, PendingChange, Session, Territory, UserAccount};
pub use value_objects::{ObservationId, Role, TerritoryId, TerritoryStatus, UserId};
