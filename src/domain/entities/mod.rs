pub mod observation;
pub mod pending_change;
pub mod territory;
pub mod user;

pub use observation::{group_by_territory, NewObservation, Observation};
pub use pending_change::{PendingChange, TABLE_OBSERVATIONS, TABLE_TERRITORIES};
pub use territory::{
    ensure_unique_numero, field_work_cmp, sort_for_field_work, NewTerritory, Territory,
    TerritoryStatusPatch,
};
pub use user::{AuthUser, Session, UserAccount};
