pub mod backend;
pub mod cache;
pub mod map;
pub mod network;
pub mod notifications;
pub mod storage;
