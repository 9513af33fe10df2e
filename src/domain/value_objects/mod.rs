pub mod change_kind;
pub mod geometry;
pub mod observation_id;
pub mod role;
pub mod territory_id;
pub mod territory_status;
pub mod user_id;

pub use change_kind::ChangeKind;
pub use geometry::{Bounds, Coordinates, GeoJsonPolygon, PolygonRing};
pub use observation_id::ObservationId;
pub use role::Role;
pub use territory_id::TerritoryId;
pub use territory_status::TerritoryStatus;
pub use user_id::UserId;
