//! till-core - Core library for Till
//!
//! This crate contains the models, database layer, reconciliation engine and
//! services shared by the Till API server and CLI. Devices queue writes
//! while offline and push them here; the engine replays them against the
//! single authoritative store.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod sync;
pub mod util;

pub use config::{ExhaustedPolicy, SyncSettings};
pub use db::Database;
pub use error::{Error, Result};
pub use services::{DatabaseService, SyncService};
pub use sync::{DrainReport, PushResponse, ReconciliationEngine};
