//! Sync job control surface

pub mod routes;
pub mod types;

pub use routes::sync_routes;
