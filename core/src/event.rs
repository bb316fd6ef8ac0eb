//! Life events (baptism, graduation, military service, emigration, ...)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::parse_optional_date;
use crate::{clean_text, CoreError, PersonId, Result};

/// A stored life event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub person_id: PersonId,
    pub event_type: String,
    pub event_date: Option<NaiveDate>,
    pub event_place: Option<String>,
    pub description: Option<String>,
}

/// Payload for creating an event
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventInput {
    pub person_id: Option<PersonId>,
    pub event_type: Option<String>,
    pub event_date: Option<String>,
    pub event_place: Option<String>,
    pub description: Option<String>,
}

impl EventInput {
    pub fn build(self) -> Result<Event> {
        let person_id = self
            .person_id
            .ok_or_else(|| CoreError::Validation("person_id is required".to_string()))?;
        let event_type = clean_text(self.event_type)
            .ok_or_else(|| CoreError::Validation("event_type is required".to_string()))?;

        Ok(Event {
            id: 0,
            person_id,
            event_type,
            event_date: parse_optional_date("event_date", self.event_date.as_deref())?,
            event_place: clean_text(self.event_place),
            description: clean_text(self.description),
        })
    }
}
