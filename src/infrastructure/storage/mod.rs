pub mod connection_pool;
pub mod memory_local_store;
pub mod prefixed_store;
pub mod sqlite_local_store;

pub use connection_pool::ConnectionPool;
pub use memory_local_store::MemoryLocalStore;
pub use prefixed_store::{PrefixedStore, PENDING_CHANGES_KEY, SESSION_KEY, TERRITORIES_CACHE_KEY};
pub use sqlite_local_store::SqliteLocalStore;
