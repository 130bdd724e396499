//! Database connection management

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;
use super::unit_of_work::UnitOfWork;
use super::{
    SqlitePurchaseRepository, SqliteProductRepository, SqliteSaleRepository, SqliteSyncQueue,
    SqliteUserRepository,
};
use crate::error::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database wrapper owning the single authoritative `SQLite` connection
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;

        let database = Self {
            conn,
            path: Some(path),
        };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let database = Self { conn, path: None };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for a write-heavy queue workload
    fn configure(&self) -> Result<()> {
        // In-memory databases report "memory" and keep their journal mode
        self.conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .ok();
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Begin an all-or-nothing unit of work.
    ///
    /// The transaction is opened with `BEGIN IMMEDIATE`, taking the database
    /// write lock up front so read-modify-write sequences on one entity id
    /// cannot interleave with another writer.
    pub fn unit_of_work(&mut self) -> Result<UnitOfWork<'_>> {
        UnitOfWork::begin(&mut self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Path of the backing file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub const fn products(&self) -> SqliteProductRepository<'_> {
        SqliteProductRepository::new(&self.conn)
    }

    pub const fn users(&self) -> SqliteUserRepository<'_> {
        SqliteUserRepository::new(&self.conn)
    }

    pub const fn sales(&self) -> SqliteSaleRepository<'_> {
        SqliteSaleRepository::new(&self.conn)
    }

    pub const fn purchases(&self) -> SqlitePurchaseRepository<'_> {
        SqlitePurchaseRepository::new(&self.conn)
    }

    pub const fn sync_queue(&self) -> SqliteSyncQueue<'_> {
        SqliteSyncQueue::new(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());

        let val: i32 = db
            .connection()
            .query_row("SELECT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(val, 1);
    }

    #[test]
    fn test_open_file_enables_wal() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("till.db");

        let db = Database::open(&db_path).unwrap();
        assert_eq!(db.path(), Some(db_path.as_path()));

        let mode: String = db
            .connection()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "wal");
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("till.db");

        drop(Database::open(&db_path).unwrap());
        let db = Database::open(&db_path).unwrap();

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM sync_operations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
