//! Async service wrappers shared by the API and CLI

mod database;
mod sync;

pub use database::DatabaseService;
pub use sync::{EnqueueSummary, SyncService};
