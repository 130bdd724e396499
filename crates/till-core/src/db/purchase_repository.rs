//! Purchase repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Purchase, PurchaseEntry, PurchaseItem};

/// `SQLite` storage for supplier purchases and their lines
pub struct SqlitePurchaseRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePurchaseRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM purchases WHERE id = ?)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn insert(&self, purchase: &Purchase) -> Result<()> {
        self.conn.execute(
            "INSERT INTO purchases (id, supplier, total_amount, device_id, version, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                purchase.id,
                purchase.supplier,
                purchase.total_amount,
                purchase.device_id,
                purchase.version,
                purchase.created_at
            ],
        )?;
        Ok(())
    }

    pub fn insert_item(&self, item: &PurchaseItem) -> Result<()> {
        self.conn.execute(
            "INSERT INTO purchase_items (id, purchase_id, product_id, quantity, price, total)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                item.id,
                item.purchase_id,
                item.product_id,
                item.quantity,
                item.price,
                item.total
            ],
        )?;
        Ok(())
    }

    /// Get a purchase with its lines
    pub fn get(&self, id: &str) -> Result<Option<PurchaseEntry>> {
        let Some(purchase) = self
            .conn
            .query_row(
                "SELECT id, supplier, total_amount, device_id, version, created_at FROM purchases WHERE id = ?",
                params![id],
                Self::parse_purchase,
            )
            .optional()?
        else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT id, purchase_id, product_id, quantity, price, total
             FROM purchase_items
             WHERE purchase_id = ?
             ORDER BY rowid",
        )?;
        let items = stmt
            .query_map(params![id], |row| {
                Ok(PurchaseItem {
                    id: row.get(0)?,
                    purchase_id: row.get(1)?,
                    product_id: row.get(2)?,
                    quantity: row.get(3)?,
                    price: row.get(4)?,
                    total: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(PurchaseEntry { purchase, items }))
    }

    /// List purchase headers, newest first
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<Purchase>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, supplier, total_amount, device_id, version, created_at
             FROM purchases
             ORDER BY created_at DESC, id
             LIMIT ? OFFSET ?",
        )?;

        let purchases = stmt
            .query_map(params![limit as i64, offset as i64], Self::parse_purchase)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(purchases)
    }

    fn parse_purchase(row: &rusqlite::Row<'_>) -> rusqlite::Result<Purchase> {
        Ok(Purchase {
            id: row.get(0)?,
            supplier: row.get(1)?,
            total_amount: row.get(2)?,
            device_id: row.get(3)?,
            version: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
