//! All-or-nothing write scope

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::{
    SqlitePurchaseRepository, SqliteProductRepository, SqliteSaleRepository, SqliteSyncQueue,
    SqliteUserRepository,
};
use crate::error::Result;
use crate::store::{StockLedger, TransactionApplier};

/// A write transaction over every repository.
///
/// Nothing becomes visible until [`UnitOfWork::commit`]; dropping the unit
/// without committing rolls every write back.
pub struct UnitOfWork<'c> {
    tx: Transaction<'c>,
}

impl<'c> UnitOfWork<'c> {
    pub(crate) fn begin(conn: &'c mut Connection) -> Result<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self { tx })
    }

    pub fn products(&self) -> SqliteProductRepository<'_> {
        SqliteProductRepository::new(&self.tx)
    }

    pub fn users(&self) -> SqliteUserRepository<'_> {
        SqliteUserRepository::new(&self.tx)
    }

    pub fn sales(&self) -> SqliteSaleRepository<'_> {
        SqliteSaleRepository::new(&self.tx)
    }

    pub fn purchases(&self) -> SqlitePurchaseRepository<'_> {
        SqlitePurchaseRepository::new(&self.tx)
    }

    pub fn sync_queue(&self) -> SqliteSyncQueue<'_> {
        SqliteSyncQueue::new(&self.tx)
    }

    /// Stock adjustments; only reachable inside a unit of work
    pub fn stock(&self) -> StockLedger<'_> {
        StockLedger::new(&self.tx)
    }

    /// Compound sale and purchase writes
    pub fn transactions(&self) -> TransactionApplier<'_> {
        TransactionApplier::new(&self.tx)
    }

    /// Run `f` under a savepoint. When it fails only its own writes are
    /// undone and the unit stays open for further work.
    pub fn attempt<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.tx.execute_batch("SAVEPOINT attempt")?;
        match f(self) {
            Ok(value) => {
                self.tx.execute_batch("RELEASE attempt")?;
                Ok(value)
            }
            Err(error) => {
                self.tx
                    .execute_batch("ROLLBACK TO attempt; RELEASE attempt")?;
                Err(error)
            }
        }
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, VersionedRepository};
    use crate::error::Error;
    use crate::models::Product;

    #[test]
    fn test_commit_publishes_writes() {
        let mut db = Database::open_in_memory().unwrap();

        let uow = db.unit_of_work().unwrap();
        uow.products()
            .reconcile(Product::new("p1", "Salt", 0.5, 3))
            .unwrap();
        uow.commit().unwrap();

        assert!(db.products().get("p1").unwrap().is_some());
    }

    #[test]
    fn test_drop_rolls_back() {
        let mut db = Database::open_in_memory().unwrap();

        {
            let uow = db.unit_of_work().unwrap();
            uow.products()
                .reconcile(Product::new("p1", "Salt", 0.5, 3))
                .unwrap();
        }

        assert!(db.products().get("p1").unwrap().is_none());
    }

    #[test]
    fn test_failed_attempt_keeps_earlier_and_later_writes() {
        let mut db = Database::open_in_memory().unwrap();

        let uow = db.unit_of_work().unwrap();
        uow.products()
            .reconcile(Product::new("p1", "Salt", 0.5, 3))
            .unwrap();
        let err = uow
            .attempt(|uow| {
                uow.products()
                    .reconcile(Product::new("p2", "Flour", 1.0, 4))?;
                Err::<(), _>(Error::InvalidInput("nope".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        uow.products()
            .reconcile(Product::new("p3", "Tea", 2.0, 1))
            .unwrap();
        uow.commit().unwrap();

        assert!(db.products().get("p1").unwrap().is_some());
        assert!(db.products().get("p2").unwrap().is_none());
        assert!(db.products().get("p3").unwrap().is_some());
    }
}
