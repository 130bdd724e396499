//! Purchase model

use serde::{Deserialize, Serialize};

use super::line_item::{new_line_item_id, LineItem};

/// Stock purchase from a supplier. `total_amount` is recomputed from the lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    #[serde(default)]
    pub supplier: String,
    #[serde(default, alias = "totalAmount")]
    pub total_amount: f64,
    #[serde(default, alias = "deviceId")]
    pub device_id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default, alias = "createdAt")]
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseItem {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "purchaseId")]
    pub purchase_id: String,
    #[serde(alias = "productId")]
    pub product_id: String,
    pub quantity: i64,
    pub price: f64,
    #[serde(default)]
    pub total: f64,
}

/// A purchase with its lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseEntry {
    pub purchase: Purchase,
    #[serde(default)]
    pub items: Vec<PurchaseItem>,
}

impl LineItem for PurchaseItem {
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
        self.purchase_id = parent_id.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_total_amount_alias() {
        let purchase: Purchase =
            serde_json::from_str(r#"{"id":"pu1","supplier":"Bidco","totalAmount":12.5}"#).unwrap();
        assert_eq!(purchase.supplier, "Bidco");
        assert!((purchase.total_amount - 12.5).abs() < f64::EPSILON);
    }
}
