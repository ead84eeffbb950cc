//! Activity log entry types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::storage::EntityId;

/// What the user did
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityAction {
    /// A record was created
    Create,
    /// A record was updated
    Update,
    /// A record was deleted
    Delete,
    /// Data was synchronized with the ERP
    Sync,
    /// Application-defined action
    Custom(String),
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Sync => write!(f, "sync"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl ActivityAction {
    fn from_name(name: &str) -> Self {
        match name {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "sync" => Self::Sync,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl FromStr for ActivityAction {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl Serialize for ActivityAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActivityAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_name(&raw))
    }
}

/// A single append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// Entry id, UUIDv7 so ids sort by time
    pub id: Uuid,
    /// User that performed the action
    pub user_id: String,
    /// What was done
    pub action: ActivityAction,
    /// Kind of record affected (e.g. "Product")
    pub entity_type: String,
    /// Affected record, when the action targets one
    pub entity_id: Option<EntityId>,
    /// Human-readable summary
    pub description: String,
    /// Free-form structured context
    pub metadata: Map<String, Value>,
    /// When the action happened
    pub created_at: DateTime<Utc>,
}

/// An entry before it is attributed to a user
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDraft {
    /// What was done
    pub action: ActivityAction,
    /// Kind of record affected
    pub entity_type: String,
    /// Affected record
    pub entity_id: Option<EntityId>,
    /// Human-readable summary
    pub description: String,
    /// Free-form structured context
    pub metadata: Map<String, Value>,
}

impl ActivityDraft {
    /// Start a draft
    pub fn new(
        action: ActivityAction,
        entity_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity_type: entity_type.into(),
            entity_id: None,
            description: description.into(),
            metadata: Map::new(),
        }
    }

    /// Set the affected record
    #[must_use]
    pub fn with_entity_id(mut self, id: EntityId) -> Self {
        self.entity_id = Some(id);
        self
    }

    /// Add one metadata key
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attribute the draft to `user_id` and stamp it
    pub fn into_entry(self, user_id: impl Into<String>) -> ActivityEntry {
        ActivityEntry {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            description: self.description,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_strings() {
        assert_eq!(ActivityAction::Create.to_string(), "create");
        assert_eq!(ActivityAction::Custom("export".into()).to_string(), "export");
        assert_eq!("sync".parse::<ActivityAction>().unwrap(), ActivityAction::Sync);
        assert_eq!(
            "stock_adjustment".parse::<ActivityAction>().unwrap(),
            ActivityAction::Custom("stock_adjustment".into())
        );
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = ActivityDraft::new(ActivityAction::Delete, "Order", "Deleted Order #4")
            .with_entity_id(4)
            .with_metadata("reference", json!("ORD-000004"))
            .into_entry("user-1");

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["userId"], "user-1");
        assert_eq!(value["action"], "delete");
        assert_eq!(value["entityType"], "Order");
        assert_eq!(value["entityId"], 4);
        assert_eq!(value["metadata"]["reference"], "ORD-000004");
        assert!(value["createdAt"].is_string());

        let back: ActivityEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_entry_ids_are_v7() {
        let entry = ActivityDraft::new(ActivityAction::Sync, "Product", "Synced").into_entry("u");
        assert_eq!(entry.id.get_version_num(), 7);
        assert!(entry.entity_id.is_none());
    }
}
