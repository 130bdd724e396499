//! Product repository implementation

use rusqlite::{params, Connection};

use super::versioned::VersionedRepository;
use crate::error::{Error, Result};
use crate::models::Product;

const PRODUCT_COLUMNS: &str = "id, name, price, stock, version, updated_at";

/// `SQLite` product storage
pub struct SqliteProductRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteProductRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get a product by ID
    pub fn get(&self, id: &str) -> Result<Option<Product>> {
        let result = self.conn.query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"),
            params![id],
            Self::parse_product,
        );

        match result {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a product by ID, failing with `NotFound` when absent
    pub fn require(&self, id: &str) -> Result<Product> {
        self.get(id)?
            .ok_or_else(|| Error::not_found("product", id))
    }

    /// List all products by name
    pub fn list(&self) -> Result<Vec<Product>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name COLLATE NOCASE, id"
        ))?;

        let products = stmt
            .query_map([], Self::parse_product)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(products)
    }

    fn parse_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            stock: row.get(3)?,
            version: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl VersionedRepository for SqliteProductRepository<'_> {
    type Record = Product;

    fn find(&self, id: &str) -> Result<Option<Product>> {
        self.get(id)
    }

    fn insert(&self, product: &Product) -> Result<()> {
        self.conn.execute(
            "INSERT INTO products (id, name, price, stock, version, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                product.id,
                product.name,
                product.price,
                product.stock,
                product.version,
                product.updated_at
            ],
        )?;
        Ok(())
    }

    fn update_if_version(&self, product: &Product, expected_version: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE products SET name = ?, price = ?, stock = ?, version = ?, updated_at = ?
             WHERE id = ? AND version = ?",
            params![
                product.name,
                product.price,
                product.stock,
                product.version,
                product.updated_at,
                product.id,
                expected_version
            ],
        )?;
        Ok(rows)
    }
}
