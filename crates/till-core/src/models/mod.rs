//! Data models for Till

mod line_item;
mod product;
mod purchase;
mod sale;
mod sync_operation;
mod user;
mod versioned;

pub use line_item::LineItem;
pub use product::Product;
pub use purchase::{Purchase, PurchaseEntry, PurchaseItem};
pub use sale::{Sale, SaleEntry, SaleItem};
pub use sync_operation::{DeadLetter, EntityType, NewSyncOperation, OperationKind, SyncOperation};
pub use user::User;
pub use versioned::Versioned;
