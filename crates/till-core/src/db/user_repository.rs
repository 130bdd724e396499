//! User repository implementation

use rusqlite::{params, Connection};

use super::versioned::VersionedRepository;
use crate::error::Result;
use crate::models::User;

const USER_COLUMNS: &str =
    "id, name, email, password, role, device_id, version, created_at, updated_at";

/// `SQLite` user storage
pub struct SqliteUserRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteUserRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get a user by ID
    pub fn get(&self, id: &str) -> Result<Option<User>> {
        self.query_one(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"), id)
    }

    /// Get a user by email (case-insensitive)
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_one(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE LIMIT 1"),
            email.trim(),
        )
    }

    /// List all users by name
    pub fn list(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY name COLLATE NOCASE, id"
        ))?;

        let users = stmt
            .query_map([], Self::parse_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(users)
    }

    fn query_one(&self, sql: &str, key: &str) -> Result<Option<User>> {
        match self.conn.query_row(sql, params![key], Self::parse_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn parse_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            role: row.get(4)?,
            device_id: row.get(5)?,
            version: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl VersionedRepository for SqliteUserRepository<'_> {
    type Record = User;

    fn find(&self, id: &str) -> Result<Option<User>> {
        self.get(id)
    }

    fn insert(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, email, password, role, device_id, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                user.id,
                user.name,
                user.email,
                user.password,
                user.role,
                user.device_id,
                user.version,
                user.created_at,
                user.updated_at
            ],
        )?;
        Ok(())
    }

    fn update_if_version(&self, user: &User, expected_version: i64) -> Result<usize> {
        // created_at is immutable once the account exists
        let rows = self.conn.execute(
            "UPDATE users SET name = ?, email = ?, password = ?, role = ?, device_id = ?, version = ?, updated_at = ?
             WHERE id = ? AND version = ?",
            params![
                user.name,
                user.email,
                user.password,
                user.role,
                user.device_id,
                user.version,
                user.updated_at,
                user.id,
                expected_version
            ],
        )?;
        Ok(rows)
    }
}
