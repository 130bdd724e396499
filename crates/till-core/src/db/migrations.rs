//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in statements {
        tx.execute_batch(stmt)?;
    }
    tx.commit()?;
    Ok(())
}

/// Migration to version 1: entity tables and the pending queue
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                password TEXT NOT NULL DEFAULT '',
                role TEXT NOT NULL DEFAULT '',
                device_id TEXT NOT NULL DEFAULT '',
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
            "CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                price REAL NOT NULL DEFAULT 0,
                stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                version INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS sales (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL DEFAULT '',
                total REAL NOT NULL,
                device_id TEXT NOT NULL DEFAULT '',
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_sales_created ON sales(created_at DESC)",
            "CREATE TABLE IF NOT EXISTS sale_items (
                id TEXT PRIMARY KEY,
                sale_id TEXT NOT NULL REFERENCES sales(id) ON DELETE CASCADE,
                product_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL NOT NULL,
                total REAL NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_sale_items_sale ON sale_items(sale_id)",
            "CREATE TABLE IF NOT EXISTS purchases (
                id TEXT PRIMARY KEY,
                supplier TEXT NOT NULL DEFAULT '',
                total_amount REAL NOT NULL,
                device_id TEXT NOT NULL DEFAULT '',
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_purchases_created ON purchases(created_at DESC)",
            "CREATE TABLE IF NOT EXISTS purchase_items (
                id TEXT PRIMARY KEY,
                purchase_id TEXT NOT NULL REFERENCES purchases(id) ON DELETE CASCADE,
                product_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL NOT NULL,
                total REAL NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_purchase_items_purchase ON purchase_items(purchase_id)",
            // Pending device operations, replayed in created_at order
            "CREATE TABLE IF NOT EXISTS sync_operations (
                id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL DEFAULT '',
                operation TEXT NOT NULL,
                payload TEXT NOT NULL,
                device_id TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_operations_order ON sync_operations(created_at, id)",
            // Demo operator account; the password column holds an opaque hash
            "INSERT OR IGNORE INTO users (id, name, email, password, role, device_id, version, created_at, updated_at)
             VALUES ('admin-uuid-1', 'Admin', 'admin@example.com', 'hashedpassword', 'admin', 'device-1', 1,
                     CAST(strftime('%s','now') AS INTEGER) * 1000, CAST(strftime('%s','now') AS INTEGER) * 1000)",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: retry diagnostics, dead letters and the applied
/// operation ledger
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "ALTER TABLE sync_operations ADD COLUMN last_error TEXT",
            "CREATE TABLE IF NOT EXISTS dead_letter_operations (
                id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL DEFAULT '',
                operation TEXT NOT NULL,
                payload TEXT NOT NULL,
                device_id TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                retry_count INTEGER NOT NULL,
                last_error TEXT,
                failed_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_dead_letters_failed ON dead_letter_operations(failed_at DESC)",
            "CREATE TABLE IF NOT EXISTS applied_operations (
                operation_id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL DEFAULT '',
                applied_at INTEGER NOT NULL
            )",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_creates_every_table() {
        let conn = setup();
        run(&conn).unwrap();

        for table in [
            "users",
            "products",
            "sales",
            "sale_items",
            "purchases",
            "purchase_items",
            "sync_operations",
            "dead_letter_operations",
            "applied_operations",
        ] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn test_seeds_demo_admin() {
        let conn = setup();
        run(&conn).unwrap();

        let role: String = conn
            .query_row(
                "SELECT role FROM users WHERE id = 'admin-uuid-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(role, "admin");
    }
}
