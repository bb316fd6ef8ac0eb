//! Family Tree Core Module
//!
//! Domain model for the family tree service. Individuals are linked through
//! family units: a family joins up to two partners, and a child points at the
//! family it was born into rather than at individual parents.
//!
//! Nothing in this crate touches storage or HTTP; the store and the API build
//! on these types.

pub mod dates;
pub mod document;
pub mod event;
pub mod exchange;
pub mod family;
pub mod gedcom;
pub mod graph;
pub mod patch;
pub mod person;
pub mod settings;
pub mod stats;

pub use document::{Document, DocumentInput, FileType};
pub use event::{Event, EventInput};
pub use exchange::{ExportBundle, ImportSummary};
pub use family::{Family, FamilyInput, FamilyPatch, FamilyStatus, RelationshipType};
pub use graph::{
    FamilyGraph, FamilyView, NameRef, PersonView, Relations, TreeData, TreeLink, TreeNode,
};
pub use person::{Gender, Person, PersonInput, PersonPatch};
pub use settings::{NodePosition, PositionInput, TreeSettings, TreeSettingsPatch};
pub use stats::TreeStats;

/// Row identifier of a person
pub type PersonId = i64;

/// Row identifier of a family
pub type FamilyId = i64;

/// Core domain errors
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid date '{value}' for {field}, expected YYYY-MM-DD")]
    InvalidDate { field: String, value: String },

    #[error("Unknown value '{value}' for {field}")]
    UnknownValue { field: String, value: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Trim a free-text value, mapping blank strings to `None`
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_drops_blank_values() {
        assert_eq!(clean_text(Some("  ".to_string())), None);
        assert_eq!(clean_text(None), None);
        assert_eq!(
            clean_text(Some(" Budapest ".to_string())),
            Some("Budapest".to_string())
        );
    }

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidDate {
            field: "birth_date".to_string(),
            value: "1990-13-01".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid date '1990-13-01' for birth_date, expected YYYY-MM-DD"
        );
    }
}
