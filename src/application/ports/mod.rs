pub mod backend;
pub mod connectivity;
pub mod local_store;
pub mod map_surface;
pub mod notifier;
pub mod session;

pub use backend::{
    AuthGateway, ChangeReplayGateway, ObservationGateway, TerritoryGateway, UserGateway,
};
pub use connectivity::ConnectivityMonitor;
pub use local_store::LocalStore;
pub use map_surface::{MapSurface, MapSurfaceError};
pub use notifier::{Notification, NotificationLevel, Notifier};
pub use session::{CurrentActor, SessionToken};
