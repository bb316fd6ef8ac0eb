//! JSON export and import bundles
//!
//! An export holds every active person, family and event. On import the
//! original ids are only used to rewire links between the imported records;
//! every record is created anew.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Event, EventInput, Family, FamilyInput, Person, PersonInput};

/// Full export of the active tree
#[derive(Debug, Clone, Serialize)]
pub struct ExportBundle {
    pub persons: Vec<Person>,
    pub families: Vec<Family>,
    pub events: Vec<Event>,
    pub export_date: DateTime<Utc>,
}

/// Incoming bundle. Accepts exports of this service and of older releases
/// that named families "marriages".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportBundle {
    #[serde(default)]
    pub persons: Vec<ImportedPerson>,
    #[serde(default, alias = "marriages")]
    pub families: Vec<ImportedFamily>,
    #[serde(default)]
    pub events: Vec<ImportedEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportedPerson {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub input: PersonInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportedFamily {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub input: FamilyInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportedEvent {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub input: EventInput,
}

/// Old id to new id, per record kind
#[derive(Debug, Default)]
pub struct IdMap {
    map: HashMap<i64, i64>,
}

impl IdMap {
    pub fn insert(&mut self, old: Option<i64>, new: i64) {
        if let Some(old) = old {
            self.map.insert(old, new);
        }
    }

    /// Translate a reference. References to records outside the bundle
    /// resolve to `None`.
    pub fn resolve(&self, old: Option<i64>) -> Option<i64> {
        old.and_then(|o| self.map.get(&o).copied())
    }
}

/// Counts reported back after an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub persons: usize,
    pub families: usize,
    pub events: usize,
    /// Records dropped because they failed validation or lost a required link
    pub skipped: usize,
}

impl ImportSummary {
    pub fn imported_count(&self) -> usize {
        self.persons + self.families + self.events
    }
}
