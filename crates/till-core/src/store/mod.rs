//! Domain writes layered over the repositories

mod stock;
mod transactions;

pub use stock::StockLedger;
pub use transactions::{Recorded, TransactionApplier};
pub(crate) use transactions::validate_lines;
