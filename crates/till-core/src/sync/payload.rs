//! Typed decoding of queued operation payloads

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::models::{EntityType, Product, PurchaseEntry, SaleEntry, SyncOperation, User};
use crate::store::validate_lines;

/// A queued operation's payload, decoded for its entity type
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPayload {
    Product(Product),
    User(User),
    Sale(SaleEntry),
    Purchase(PurchaseEntry),
}

impl SyncPayload {
    /// Decode and validate the payload of a queued operation.
    ///
    /// Fails with [`Error::UnknownEntityType`] when the type cannot be routed
    /// and [`Error::Decode`] when the payload does not fit the type.
    pub fn decode(operation: &SyncOperation) -> Result<Self> {
        let kind = operation.kind()?;

        let payload = match kind {
            EntityType::Product => {
                let product: Product = parse(kind, &operation.payload)?;
                require_id(kind, &product.id)?;
                if !product.price.is_finite() || product.price < 0.0 {
                    return Err(Error::decode(kind.as_str(), format!("invalid price {}", product.price)));
                }
                if product.stock < 0 {
                    return Err(Error::decode(kind.as_str(), format!("negative stock {}", product.stock)));
                }
                Self::Product(product)
            }
            EntityType::User => {
                let user: User = parse(kind, &operation.payload)?;
                require_id(kind, &user.id)?;
                Self::User(user)
            }
            EntityType::Sale => {
                let entry: SaleEntry = parse(kind, &operation.payload)?;
                require_id(kind, &entry.sale.id)?;
                validate_lines(kind.as_str(), &entry.items)
                    .map_err(|error| Error::decode(kind.as_str(), error))?;
                Self::Sale(entry)
            }
            EntityType::Purchase => {
                let entry: PurchaseEntry = parse(kind, &operation.payload)?;
                require_id(kind, &entry.purchase.id)?;
                validate_lines(kind.as_str(), &entry.items)
                    .map_err(|error| Error::decode(kind.as_str(), error))?;
                Self::Purchase(entry)
            }
        };

        if !operation.entity_id.is_empty() && operation.entity_id != payload.entity_id() {
            tracing::warn!(
                operation_id = %operation.id,
                envelope_entity_id = %operation.entity_id,
                payload_entity_id = %payload.entity_id(),
                "Envelope entity id differs from payload, using payload"
            );
        }

        Ok(payload)
    }

    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Product(_) => EntityType::Product,
            Self::User(_) => EntityType::User,
            Self::Sale(_) => EntityType::Sale,
            Self::Purchase(_) => EntityType::Purchase,
        }
    }

    /// Id of the record the payload writes
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Product(product) => &product.id,
            Self::User(user) => &user.id,
            Self::Sale(entry) => &entry.sale.id,
            Self::Purchase(entry) => &entry.purchase.id,
        }
    }
}

fn parse<T: DeserializeOwned>(kind: EntityType, payload: &serde_json::Value) -> Result<T> {
    serde_json::from_value(payload.clone()).map_err(|error| Error::decode(kind.as_str(), error))
}

fn require_id(kind: EntityType, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::decode(kind.as_str(), "missing id"));
    }
    Ok(())
}
