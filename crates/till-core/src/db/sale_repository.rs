//! Sale repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Sale, SaleEntry, SaleItem};

/// `SQLite` storage for sales and their lines
pub struct SqliteSaleRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSaleRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Whether a sale header with this id has been recorded
    pub fn exists(&self, id: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sales WHERE id = ?)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn insert(&self, sale: &Sale) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sales (id, user_id, total, device_id, version, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                sale.id,
                sale.user_id,
                sale.total,
                sale.device_id,
                sale.version,
                sale.created_at
            ],
        )?;
        Ok(())
    }

    pub fn insert_item(&self, item: &SaleItem) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sale_items (id, sale_id, product_id, quantity, price, total) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                item.id,
                item.sale_id,
                item.product_id,
                item.quantity,
                item.price,
                item.total
            ],
        )?;
        Ok(())
    }

    /// Get a sale with its lines
    pub fn get(&self, id: &str) -> Result<Option<SaleEntry>> {
        let sale = self
            .conn
            .query_row(
                "SELECT id, user_id, total, device_id, version, created_at FROM sales WHERE id = ?",
                params![id],
                Self::parse_sale,
            )
            .optional()?;

        let Some(sale) = sale else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT id, sale_id, product_id, quantity, price, total
             FROM sale_items
             WHERE sale_id = ?
             ORDER BY rowid",
        )?;
        let items = stmt
            .query_map(params![id], |row| {
                Ok(SaleItem {
                    id: row.get(0)?,
                    sale_id: row.get(1)?,
                    product_id: row.get(2)?,
                    quantity: row.get(3)?,
                    price: row.get(4)?,
                    total: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(SaleEntry { sale, items }))
    }

    /// List sale headers, newest first
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<Sale>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, total, device_id, version, created_at
             FROM sales
             ORDER BY created_at DESC, id
             LIMIT ? OFFSET ?",
        )?;

        let sales = stmt
            .query_map(params![limit as i64, offset as i64], Self::parse_sale)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(sales)
    }

    fn parse_sale(row: &rusqlite::Row<'_>) -> rusqlite::Result<Sale> {
        Ok(Sale {
            id: row.get(0)?,
            user_id: row.get(1)?,
            total: row.get(2)?,
            device_id: row.get(3)?,
            version: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
