//! Sync operation envelope

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

/// Entity kinds the reconciliation engine can route to an applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Product,
    User,
    Sale,
    Purchase,
}

impl EntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::User => "user",
            Self::Sale => "sale",
            Self::Purchase => "purchase",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(Self::Product),
            "user" => Ok(Self::User),
            "sale" => Ok(Self::Sale),
            "purchase" => Ok(Self::Purchase),
            _ => Err(Error::UnknownEntityType(value.to_string())),
        }
    }
}

/// What the device believes it did. Advisory only: the applier decides the
/// actual effect from the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Create,
    Update,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            other => Err(Error::InvalidInput(format!("unknown operation kind '{other}'"))),
        }
    }
}

/// An operation as submitted by a device, before it is queued.
///
/// `entity_type` stays a raw string here: an unroutable type is still queued
/// and reported, never dropped at the door.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSyncOperation {
    pub id: String,
    #[serde(alias = "entityType")]
    pub entity_type: String,
    #[serde(default, alias = "entityId")]
    pub entity_id: String,
    #[serde(default)]
    pub operation: OperationKind,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, alias = "deviceId")]
    pub device_id: String,
}

impl NewSyncOperation {
    /// Trim identifiers and reject an envelope without an operation id.
    pub fn normalized(mut self) -> Result<Self> {
        self.id = normalize_text_option(Some(self.id))
            .ok_or_else(|| Error::InvalidInput("sync operation id must not be empty".into()))?;
        self.entity_type = self.entity_type.trim().to_string();
        self.entity_id = self.entity_id.trim().to_string();
        self.device_id = self.device_id.trim().to_string();
        Ok(self)
    }
}

/// A queued operation awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: OperationKind,
    pub payload: serde_json::Value,
    pub device_id: String,
    /// Queue ordering key (Unix ms, server-stamped)
    pub created_at: i64,
    pub retry_count: u32,
    /// Error text of the most recent failed attempt
    pub last_error: Option<String>,
}

impl SyncOperation {
    /// Resolve the routable entity kind.
    pub fn kind(&self) -> Result<EntityType> {
        self.entity_type.parse()
    }

    pub const fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }
}

/// An exhausted operation moved out of the active queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    #[serde(flatten)]
    pub operation: SyncOperation,
    /// When the operation was dead-lettered (Unix ms)
    pub failed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_parses_known_kinds() {
        assert_eq!("product".parse::<EntityType>().unwrap(), EntityType::Product);
        assert_eq!(" Sale ".parse::<EntityType>().unwrap(), EntityType::Sale);
        assert!(matches!(
            "widget".parse::<EntityType>(),
            Err(Error::UnknownEntityType(kind)) if kind == "widget"
        ));
    }

    #[test]
    fn new_operation_decodes_device_envelope() {
        let op: NewSyncOperation = serde_json::from_str(
            r#"{
                "id": " op-1 ",
                "entityType": "product",
                "entityId": "p1",
                "operation": "update",
                "payload": {"id": "p1", "version": 2},
                "deviceId": "till-7",
                "created_at": "2024-01-01T00:00:00Z",
                "retry_count": 3
            }"#,
        )
        .unwrap();
        let op = op.normalized().unwrap();
        assert_eq!(op.id, "op-1");
        assert_eq!(op.operation, OperationKind::Update);
        assert_eq!(op.device_id, "till-7");
        assert_eq!(op.payload["version"], 2);
    }

    #[test]
    fn new_operation_requires_id() {
        let op = NewSyncOperation {
            id: "   ".to_string(),
            entity_type: "product".to_string(),
            entity_id: String::new(),
            operation: OperationKind::Create,
            payload: serde_json::Value::Null,
            device_id: String::new(),
        };
        assert!(matches!(op.normalized(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn unknown_operation_kind_is_rejected_at_decode() {
        let result = serde_json::from_str::<NewSyncOperation>(
            r#"{"id":"op","entity_type":"product","operation":"delete"}"#,
        );
        assert!(result.is_err());
    }
}
