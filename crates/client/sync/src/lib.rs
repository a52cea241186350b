//! Weavegate synchronization engine.
//!
//! Mirrors the remote chain into the store and keeps the mirror live:
//! [`doctor`] finds what is missing, [`pool`] fans block imports out over
//! long-lived workers, and [`orchestrator`] drives the first-run bulk
//! import, gap repair, tip polling and fork recovery.

pub mod doctor;
pub mod fetch;
pub mod metrics;
pub mod orchestrator;
pub mod pool;

#[cfg(test)]
mod tests;

pub use orchestrator::{SyncConfig, SyncOrchestrator, SyncStatus, FORK_DEPTH_LIMIT, POLLTIME_DELAY_SECONDS};
pub use pool::{WorkerMsg, WorkerPool};
