//! Stock adjustments

use rusqlite::Connection;

use crate::db::{SqliteProductRepository, VersionedRepository};
use crate::error::{Error, Result};
use crate::models::{Product, Versioned};
use crate::util::unix_millis_now;

/// Applies signed stock deltas to products.
///
/// Constructed only through [`crate::db::UnitOfWork::stock`], so the read and
/// the write of one adjustment always share a write transaction.
pub struct StockLedger<'a> {
    products: SqliteProductRepository<'a>,
}

impl<'a> StockLedger<'a> {
    pub(crate) const fn new(conn: &'a Connection) -> Self {
        Self {
            products: SqliteProductRepository::new(conn),
        }
    }

    /// Add `delta` to the product's stock, bumping its version.
    ///
    /// Fails with [`Error::NotFound`] when the product does not exist and
    /// with [`Error::InsufficientStock`] when the result would be negative.
    /// On failure nothing is written.
    pub fn adjust_stock(&self, product_id: &str, delta: i64) -> Result<Product> {
        let mut product = self.products.require(product_id)?;

        let stock = product
            .stock
            .checked_add(delta)
            .ok_or_else(|| Error::InvalidInput(format!("stock overflow on product {product_id}")))?;
        if stock < 0 {
            return Err(Error::InsufficientStock {
                product_id: product_id.to_string(),
                available: product.stock,
                requested: delta.saturating_neg(),
            });
        }

        let expected = product.version;
        product.stock = stock;
        product.version += 1;
        product.touch(unix_millis_now());

        if self.products.update_if_version(&product, expected)? == 0 {
            return Err(Error::VersionConflict {
                entity: Product::ENTITY,
                id: product.id,
                expected,
            });
        }

        tracing::debug!(
            product_id,
            delta,
            stock = product.stock,
            version = product.version,
            "Adjusted stock"
        );
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, VersionedRepository};
    use crate::error::Error;
    use crate::models::Product;

    fn setup(stock: i64) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.products()
            .reconcile(Product::new("p1", "Maize flour", 2.0, stock))
            .unwrap();
        db
    }

    #[test]
    fn test_adjust_stock_bumps_version() {
        let mut db = setup(10);

        let uow = db.unit_of_work().unwrap();
        let product = uow.stock().adjust_stock("p1", -3).unwrap();
        uow.commit().unwrap();

        assert_eq!(product.stock, 7);
        assert_eq!(product.version, 2);

        let stored = db.products().get("p1").unwrap().unwrap();
        assert_eq!(stored.stock, 7);
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn test_adjust_stock_can_reach_zero() {
        let mut db = setup(2);
        let uow = db.unit_of_work().unwrap();
        assert_eq!(uow.stock().adjust_stock("p1", -2).unwrap().stock, 0);
    }

    #[test]
    fn test_insufficient_stock_writes_nothing() {
        let mut db = setup(2);

        let uow = db.unit_of_work().unwrap();
        let err = uow.stock().adjust_stock("p1", -3).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            }
        ));
        uow.commit().unwrap();

        let stored = db.products().get("p1").unwrap().unwrap();
        assert_eq!(stored.stock, 2);
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_missing_product() {
        let mut db = setup(2);
        let uow = db.unit_of_work().unwrap();
        let err = uow.stock().adjust_stock("ghost", 1).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "product", .. }));
    }
}
