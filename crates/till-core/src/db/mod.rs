//! Database layer for Till

mod connection;
mod migrations;
mod product_repository;
mod purchase_repository;
mod sale_repository;
mod sync_queue;
mod unit_of_work;
mod user_repository;
mod versioned;

pub use connection::Database;
pub use product_repository::SqliteProductRepository;
pub use purchase_repository::SqlitePurchaseRepository;
pub use sale_repository::SqliteSaleRepository;
pub use sync_queue::{EnqueueOutcome, SqliteSyncQueue};
pub use unit_of_work::UnitOfWork;
pub use user_repository::SqliteUserRepository;
pub use versioned::{ReconcileOutcome, VersionedRepository};
