//! Product model

use serde::{Deserialize, Serialize};

use super::versioned::Versioned;

/// A sellable product with its on-hand stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    /// Conflict-resolution counter, starts at 1
    #[serde(default)]
    pub version: i64,
    /// Last accepted write (Unix ms)
    #[serde(default, alias = "updatedAt")]
    pub updated_at: i64,
}

impl Product {
    /// Create a product at version 1
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64, stock: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            version: 1,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl Versioned for Product {
    const ENTITY: &'static str = "product";

    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn normalize(&mut self, now_ms: i64) {
        if self.version <= 0 {
            self.version = 1;
        }
        if self.updated_at <= 0 {
            self.updated_at = now_ms;
        }
    }

    fn touch(&mut self, now_ms: i64) {
        self.updated_at = now_ms;
    }
}
