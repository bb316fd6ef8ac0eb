//! Family Tree Databases Module
//!
//! SQLite persistence for the family tree: records, soft-delete trash,
//! display settings, saved node positions and the backup manager.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod backup;
pub mod records;
pub mod settings;
pub mod sqlite;
pub mod trash;

pub use backup::{BackupConfig, BackupInfo, BackupManager, BackupStats, BackupTrigger, RestoreOutcome};
pub use trash::TrashEntry;
pub use sqlite::FamilyStore;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Core(#[from] familytree_core::CoreError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to acquire connection lock")]
    LockPoisoned,
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        StoreError::NotFound { kind, id }
    }

    /// Errors caused by the caller's input rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::Invalid(_) | StoreError::Core(_))
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Record kinds that can be soft-deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    #[serde(alias = "marriage")]
    Family,
    Event,
    Document,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Family => "family",
            EntityKind::Event => "event",
            EntityKind::Document => "document",
        }
    }

    /// Table holding rows of this kind
    pub(crate) fn table(&self) -> &'static str {
        match self {
            EntityKind::Person => "persons",
            EntityKind::Family => "families",
            EntityKind::Event => "events",
            EntityKind::Document => "documents",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "person" => Ok(EntityKind::Person),
            "family" | "marriage" => Ok(EntityKind::Family),
            "event" => Ok(EntityKind::Event),
            "document" => Ok(EntityKind::Document),
            other => Err(StoreError::Invalid(format!("Unknown entity type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_accepts_marriage_alias() {
        assert_eq!("marriage".parse::<EntityKind>().unwrap(), EntityKind::Family);
        assert_eq!("family".parse::<EntityKind>().unwrap(), EntityKind::Family);
        assert!("photo".parse::<EntityKind>().is_err());

        let kind: EntityKind = serde_json::from_str("\"marriage\"").unwrap();
        assert_eq!(kind, EntityKind::Family);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"family\"");
    }

    #[test]
    fn test_not_found_message() {
        let err = StoreError::not_found(EntityKind::Person, 7);
        assert_eq!(err.to_string(), "person 7 not found");
        assert!(!err.is_client_error());
    }
}
