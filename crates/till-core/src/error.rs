//! Error types for till-core

use thiserror::Error;

/// Result type alias using till-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in till-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity absent on read
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (product, user, sale, ...)
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Lost optimistic-concurrency race
    #[error("{entity} version conflict on {id}: expected stored version {expected}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: i64,
    },

    /// Stock would go negative
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Operation cannot be routed to an applier
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Payload does not match the shape expected for its entity type
    #[error("Invalid {entity_type} payload: {reason}")]
    Decode {
        entity_type: String,
        reason: String,
    },

    /// Retry budget spent
    #[error("Operation {operation_id} exhausted its retry budget after {retry_count} attempts")]
    Exhausted {
        operation_id: String,
        retry_count: u32,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn decode(entity_type: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            entity_type: entity_type.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error comes from the backing store rather than the data
    /// being applied. Storage faults abort a drain; everything else becomes
    /// retry bookkeeping.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_classified() {
        assert!(Error::Database(rusqlite::Error::QueryReturnedNoRows).is_storage());
        assert!(!Error::UnknownEntityType("widget".to_string()).is_storage());
        assert!(!Error::InsufficientStock {
            product_id: "p1".to_string(),
            available: 1,
            requested: 3,
        }
        .is_storage());
    }

    #[test]
    fn insufficient_stock_message_names_product() {
        let error = Error::InsufficientStock {
            product_id: "p1".to_string(),
            available: 2,
            requested: 5,
        };
        let message = error.to_string();
        assert!(message.contains("p1"));
        assert!(message.contains("available 2"));
    }
}
