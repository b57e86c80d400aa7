//! BOPS Server Library
//!
//! HTTP surface for the vendor ingestion pipeline:
//!
//! - **Job control**: start single-period, continuous, and backlog syncs,
//!   query job snapshots and recent jobs.
//! - **Database**: PostgreSQL via SQLx, migrations applied on boot.
//! - **Configuration**: environment-based, validated at startup.
//!
//! Synchronous single-period syncs run inside the request; continuous and
//! backlog jobs are spawned onto the runtime and observed through the job
//! endpoints. Shutting the server down cancels running jobs between
//! periods, never mid-write.

pub mod config;
pub mod error;
pub mod features;
pub mod state;

// Re-export commonly used types
pub use error::{AppError, AppResult};
pub use state::AppState;
