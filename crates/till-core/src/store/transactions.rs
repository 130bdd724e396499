//! Compound sale and purchase writes

use rusqlite::Connection;
use serde::Serialize;

use super::stock::StockLedger;
use crate::db::{SqlitePurchaseRepository, SqliteSaleRepository};
use crate::error::{Error, Result};
use crate::models::{LineItem, PurchaseEntry, SaleEntry};
use crate::util::unix_millis_now;

/// Result of recording a compound transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "entry", rename_all = "snake_case")]
pub enum Recorded<T> {
    /// Header, lines and stock effects were written
    Created(T),
    /// The header id was already recorded; nothing changed
    Replayed,
}

/// Writes a header, its lines and every stock effect as one unit.
///
/// Constructed through [`crate::db::UnitOfWork::transactions`]. A failure on
/// any line leaves the enclosing unit of work to be rolled back, so a sale
/// never lands with half of its stock movements.
pub struct TransactionApplier<'a> {
    conn: &'a Connection,
}

impl<'a> TransactionApplier<'a> {
    pub(crate) const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record a sale and decrement stock for each line
    pub fn create_sale(&self, entry: SaleEntry) -> Result<Recorded<SaleEntry>> {
        let SaleEntry { mut sale, mut items } = entry;
        validate_header("sale", &sale.id)?;
        validate_lines("sale", &items)?;

        let sales = SqliteSaleRepository::new(self.conn);
        if sales.exists(&sale.id)? {
            tracing::info!(sale_id = %sale.id, "Sale already recorded, skipping replay");
            return Ok(Recorded::Replayed);
        }

        sale.total = self.apply_lines(&mut items, &sale.id, -1)?;
        sale.version = sale.version.max(1);
        sale.created_at = unix_millis_now();

        sales.insert(&sale)?;
        for item in &items {
            sales.insert_item(item)?;
        }

        tracing::info!(sale_id = %sale.id, lines = items.len(), total = sale.total, "Recorded sale");
        Ok(Recorded::Created(SaleEntry { sale, items }))
    }

    /// Record a purchase and increment stock for each line
    pub fn create_purchase(&self, entry: PurchaseEntry) -> Result<Recorded<PurchaseEntry>> {
        let PurchaseEntry {
            mut purchase,
            mut items,
        } = entry;
        validate_header("purchase", &purchase.id)?;
        validate_lines("purchase", &items)?;

        let purchases = SqlitePurchaseRepository::new(self.conn);
        if purchases.exists(&purchase.id)? {
            tracing::info!(purchase_id = %purchase.id, "Purchase already recorded, skipping replay");
            return Ok(Recorded::Replayed);
        }

        purchase.total_amount = self.apply_lines(&mut items, &purchase.id, 1)?;
        purchase.version = purchase.version.max(1);
        purchase.created_at = unix_millis_now();

        purchases.insert(&purchase)?;
        for item in &items {
            purchases.insert_item(item)?;
        }

        tracing::info!(
            purchase_id = %purchase.id,
            lines = items.len(),
            total = purchase.total_amount,
            "Recorded purchase"
        );
        Ok(Recorded::Created(PurchaseEntry { purchase, items }))
    }

    /// Price every line, then move stock for every line. Returns the header
    /// total. `sign` is -1 for stock leaving the shop and 1 for stock
    /// arriving.
    fn apply_lines<L: LineItem>(&self, items: &mut [L], parent_id: &str, sign: i64) -> Result<f64> {
        let mut total = 0.0;
        for item in items.iter_mut() {
            let line_total = item.computed_total();
            item.set_total(line_total);
            item.attach(parent_id);
            total += line_total;
        }

        let ledger = StockLedger::new(self.conn);
        for item in items.iter() {
            ledger.adjust_stock(item.product_id(), sign * item.quantity())?;
        }

        Ok(total)
    }
}

fn validate_header(entity: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{entity} id must not be empty")));
    }
    Ok(())
}

/// Lines must name a product, move a positive quantity and carry a
/// non-negative finite unit price.
pub(crate) fn validate_lines<L: LineItem>(entity: &str, items: &[L]) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        if item.product_id().trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "{entity} line {index} has no product id"
            )));
        }
        if item.quantity() <= 0 {
            return Err(Error::InvalidInput(format!(
                "{entity} line {index} quantity must be positive, got {}",
                item.quantity()
            )));
        }
        if !item.price().is_finite() || item.price() < 0.0 {
            return Err(Error::InvalidInput(format!(
                "{entity} line {index} has invalid price {}",
                item.price()
            )));
        }
    }
    Ok(())
}
