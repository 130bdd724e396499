//! Shared database service wrapper used by the API and CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::Database;
use crate::models::{DeadLetter, Product, Purchase, PurchaseEntry, Sale, SaleEntry, SyncOperation, User};
use crate::{Error, Result};

fn join_error(error: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::other(error))
}

/// Thread-safe handle on the single authoritative database.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let open_path = db_path.clone();
        let db = tokio::task::spawn_blocking(move || Database::open(open_path))
            .await
            .map_err(join_error)??;

        tracing::info!("Opened database at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, `None` for in-memory services.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run synchronous store work on the blocking pool while holding the lock.
    pub(crate) async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut db = Arc::clone(&self.db).lock_owned().await;
        tokio::task::spawn_blocking(move || work(&mut db))
            .await
            .map_err(join_error)?
    }

    /// List products by name.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.blocking(|db| db.products().list()).await
    }

    /// Fetch a product by id.
    pub async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let id = id.to_string();
        self.blocking(move |db| db.products().get(&id)).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.blocking(|db| db.users().list()).await
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let id = id.to_string();
        self.blocking(move |db| db.users().get(&id)).await
    }

    /// List sale headers newest-first.
    pub async fn list_sales(&self, limit: usize, offset: usize) -> Result<Vec<Sale>> {
        self.blocking(move |db| db.sales().list(limit, offset)).await
    }

    /// Fetch a sale with its lines.
    pub async fn get_sale(&self, id: &str) -> Result<Option<SaleEntry>> {
        let id = id.to_string();
        self.blocking(move |db| db.sales().get(&id)).await
    }

    /// List purchase headers newest-first.
    pub async fn list_purchases(&self, limit: usize, offset: usize) -> Result<Vec<Purchase>> {
        self.blocking(move |db| db.purchases().list(limit, offset)).await
    }

    /// Fetch a purchase with its lines.
    pub async fn get_purchase(&self, id: &str) -> Result<Option<PurchaseEntry>> {
        let id = id.to_string();
        self.blocking(move |db| db.purchases().get(&id)).await
    }

    /// Pending operations in replay order.
    pub async fn list_queue(&self) -> Result<Vec<SyncOperation>> {
        self.blocking(|db| db.sync_queue().list_all()).await
    }

    pub async fn queue_len(&self) -> Result<usize> {
        self.blocking(|db| db.sync_queue().len()).await
    }

    /// Dead-lettered operations, most recent failure first.
    pub async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        self.blocking(|db| db.sync_queue().list_dead_letters()).await
    }
}
