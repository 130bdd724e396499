//! Sale model

use serde::{Deserialize, Serialize};

use super::line_item::{new_line_item_id, LineItem};

/// Sale header. `total` is always recomputed from the lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    /// Cashier who rang up the sale
    #[serde(default, alias = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default, alias = "deviceId")]
    pub device_id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default, alias = "createdAt")]
    pub created_at: i64,
}

/// A sold line, owned by its sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "saleId")]
    pub sale_id: String,
    #[serde(alias = "productId")]
    pub product_id: String,
    pub quantity: i64,
    pub price: f64,
    #[serde(default)]
    pub total: f64,
}

/// A sale together with its lines; the payload shape of a `sale` sync
/// operation and the read model returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEntry {
    pub sale: Sale,
    #[serde(default)]
    pub items: Vec<SaleItem>,
}

impl LineItem for SaleItem {
    fn product_id(&self) -> &str {
        &self.product_id
    }

    fn quantity(&self) -> i64 {
        self.quantity
    }

    fn price(&self) -> f64 {
        self.price
    }

    fn set_total(&mut self, total: f64) {
        self.total = total;
    }

    fn attach(&mut self, parent_id: &str) {
        if self.id.trim().is_empty() {
            self.id = new_line_item_id();
        }
        self.sale_id = parent_id.to_string();
    }
}
