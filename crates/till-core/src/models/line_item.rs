//! Shared behaviour of sale and purchase lines

use uuid::Uuid;

/// A line of a compound transaction (sale or purchase).
pub trait LineItem {
    fn product_id(&self) -> &str;

    fn quantity(&self) -> i64;

    fn price(&self) -> f64;

    fn set_total(&mut self, total: f64);

    /// Attach the line to its parent record, assigning a line id when the
    /// device did not send one.
    fn attach(&mut self, parent_id: &str);

    /// Line total derived from quantity and unit price.
    #[allow(clippy::cast_precision_loss)]
    fn computed_total(&self) -> f64 {
        self.quantity() as f64 * self.price()
    }
}

pub(crate) fn new_line_item_id() -> String {
    Uuid::now_v7().to_string()
}
