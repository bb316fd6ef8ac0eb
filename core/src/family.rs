//! Family units
//!
//! A family joins two partners (either may be unknown) and is the node
//! children hang from. Partners are "person1" and "person2", not father and
//! mother, so same-sex couples and single parents need no special casing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dates::parse_lenient;
use crate::patch::double_option;
use crate::{clean_text, CoreError, FamilyId, PersonId, Result};

/// Kind of partnership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    #[default]
    Marriage,
    CivilPartnership,
    Partnership,
    Engagement,
    Relationship,
    OneNight,
    Unknown,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Marriage => "marriage",
            RelationshipType::CivilPartnership => "civil_partnership",
            RelationshipType::Partnership => "partnership",
            RelationshipType::Engagement => "engagement",
            RelationshipType::Relationship => "relationship",
            RelationshipType::OneNight => "one_night",
            RelationshipType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "marriage" => Ok(RelationshipType::Marriage),
            "civil_partnership" => Ok(RelationshipType::CivilPartnership),
            "partnership" => Ok(RelationshipType::Partnership),
            "engagement" => Ok(RelationshipType::Engagement),
            "relationship" => Ok(RelationshipType::Relationship),
            "one_night" => Ok(RelationshipType::OneNight),
            "unknown" => Ok(RelationshipType::Unknown),
            other => Err(CoreError::UnknownValue {
                field: "relationship_type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Whether a partnership still stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyStatus {
    #[default]
    Active,
    Divorced,
    Widowed,
    Separated,
    Annulled,
    Ended,
}

impl FamilyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyStatus::Active => "active",
            FamilyStatus::Divorced => "divorced",
            FamilyStatus::Widowed => "widowed",
            FamilyStatus::Separated => "separated",
            FamilyStatus::Annulled => "annulled",
            FamilyStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for FamilyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FamilyStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(FamilyStatus::Active),
            "divorced" => Ok(FamilyStatus::Divorced),
            "widowed" => Ok(FamilyStatus::Widowed),
            "separated" => Ok(FamilyStatus::Separated),
            "annulled" => Ok(FamilyStatus::Annulled),
            "ended" => Ok(FamilyStatus::Ended),
            other => Err(CoreError::UnknownValue {
                field: "status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A stored family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub person1_id: Option<PersonId>,
    pub person2_id: Option<PersonId>,
    pub relationship_type: RelationshipType,
    pub status: FamilyStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// divorce, death, annulment, separation
    pub end_reason: Option<String>,
    pub marriage_place: Option<String>,
    pub notes: Option<String>,
}

impl Family {
    pub fn partner_ids(&self) -> Vec<PersonId> {
        [self.person1_id, self.person2_id]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn has_partner(&self, person_id: PersonId) -> bool {
        self.person1_id == Some(person_id) || self.person2_id == Some(person_id)
    }

    /// The partner opposite `person_id`, if `person_id` is a partner here
    pub fn other_partner(&self, person_id: PersonId) -> Option<PersonId> {
        if self.person1_id == Some(person_id) {
            self.person2_id
        } else if self.person2_id == Some(person_id) {
            self.person1_id
        } else {
            None
        }
    }

    /// Apply a partial update. Partner existence is checked by the caller;
    /// this only enforces that the resulting pair is complete and distinct.
    pub fn apply_patch(&mut self, patch: FamilyPatch) -> Result<()> {
        if patch.person1_id.is_some() || patch.person2_id.is_some() {
            let p1 = patch.person1_id.unwrap_or(self.person1_id);
            let p2 = patch.person2_id.unwrap_or(self.person2_id);
            let (p1, p2) = check_partners(p1, p2)?;
            self.person1_id = Some(p1);
            self.person2_id = Some(p2);
        }
        if let Some(v) = patch.relationship_type {
            self.relationship_type = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.start_date {
            self.start_date = parse_lenient(v.as_deref());
        }
        if let Some(v) = patch.end_date {
            self.end_date = parse_lenient(v.as_deref());
        }
        if let Some(v) = patch.end_reason {
            self.end_reason = clean_text(v);
        }
        if let Some(v) = patch.marriage_place {
            self.marriage_place = clean_text(v);
        }
        if let Some(v) = patch.notes {
            self.notes = clean_text(v);
        }
        Ok(())
    }
}

/// Both partners must be present and must be different people
pub fn check_partners(
    person1_id: Option<PersonId>,
    person2_id: Option<PersonId>,
) -> Result<(PersonId, PersonId)> {
    match (person1_id, person2_id) {
        (Some(p1), Some(p2)) if p1 == p2 => Err(CoreError::Validation(
            "The two partners cannot be the same person".to_string(),
        )),
        (Some(p1), Some(p2)) => Ok((p1, p2)),
        _ => Err(CoreError::Validation(
            "Both partners are required".to_string(),
        )),
    }
}

/// Payload for creating a family
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FamilyInput {
    pub person1_id: Option<PersonId>,
    pub person2_id: Option<PersonId>,
    pub relationship_type: Option<RelationshipType>,
    pub status: Option<FamilyStatus>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub end_reason: Option<String>,
    pub marriage_place: Option<String>,
    pub notes: Option<String>,
}

impl FamilyInput {
    /// Validate the payload into an unsaved family (id 0). Dates that do not
    /// parse are dropped rather than rejected.
    pub fn build(self) -> Result<Family> {
        let (p1, p2) = check_partners(self.person1_id, self.person2_id)?;
        Ok(Family {
            id: 0,
            person1_id: Some(p1),
            person2_id: Some(p2),
            relationship_type: self.relationship_type.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            start_date: parse_lenient(self.start_date.as_deref()),
            end_date: parse_lenient(self.end_date.as_deref()),
            end_reason: clean_text(self.end_reason),
            marriage_place: clean_text(self.marriage_place),
            notes: clean_text(self.notes),
        })
    }
}

/// Payload for updating a family
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FamilyPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub person1_id: Option<Option<PersonId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub person2_id: Option<Option<PersonId>>,
    #[serde(default)]
    pub relationship_type: Option<RelationshipType>,
    #[serde(default)]
    pub status: Option<FamilyStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_reason: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub marriage_place: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}
