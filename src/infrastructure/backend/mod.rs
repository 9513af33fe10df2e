pub mod client;
pub mod rest_gateway;
pub mod rows;

pub use client::RestClient;
pub use rest_gateway::RestGateway;
