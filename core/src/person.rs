//! Individuals
//!
//! A person carries personal attributes plus two optional links into the
//! family graph: the family it was born into and an adoptive family.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::dates::{parse_optional_date, years_between};
use crate::patch::double_option;
use crate::{clean_text, CoreError, FamilyId, PersonId, Result};

/// Gender of a person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "unknown" | "" => Ok(Gender::Unknown),
            other => Err(CoreError::UnknownValue {
                field: "gender".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A stored individual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,

    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub maiden_name: Option<String>,
    pub nickname: Option<String>,
    pub gender: Gender,

    pub birth_date: Option<NaiveDate>,
    pub birth_date_approximate: bool,
    pub birth_place: Option<String>,
    pub birth_country: Option<String>,

    pub death_date: Option<NaiveDate>,
    pub death_date_approximate: bool,
    /// Known to be deceased without a known date
    pub death_date_unknown: bool,
    pub death_place: Option<String>,
    pub death_country: Option<String>,
    pub death_cause: Option<String>,
    pub burial_place: Option<String>,

    pub occupation: Option<String>,
    pub education: Option<String>,
    pub religion: Option<String>,
    pub nationality: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,

    pub biography: Option<String>,
    pub notes: Option<String>,
    pub photo_path: Option<String>,
    pub custom_fields: Map<String, Value>,

    /// Family in which this person is a biological child
    pub parent_family_id: Option<FamilyId>,
    pub adoptive_family_id: Option<FamilyId>,
    pub is_twin: bool,
    pub birth_order: Option<i32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// Family name first, then given name, then middle name
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.last_name.as_str(), self.first_name.as_str()];
        if let Some(middle) = self.middle_name.as_deref() {
            parts.push(middle);
        }
        parts.join(" ")
    }

    pub fn display_name(&self) -> String {
        match self.maiden_name.as_deref() {
            Some(maiden) => format!("{} (born {maiden})", self.full_name()),
            None => self.full_name(),
        }
    }

    /// Age in whole years at death, or at `today` for the living
    pub fn age(&self, today: NaiveDate) -> Option<i32> {
        let birth = self.birth_date?;
        let end = self.death_date.unwrap_or(today);
        Some(years_between(birth, end))
    }

    pub fn is_alive(&self) -> bool {
        self.death_date.is_none() && !self.death_date_unknown
    }

    /// Apply a partial update. Validation happens before any field changes.
    pub fn apply_patch(&mut self, patch: PersonPatch, now: DateTime<Utc>) -> Result<()> {
        let first_name = patch.first_name.map(|v| required_name("first_name", v)).transpose()?;
        let last_name = patch.last_name.map(|v| required_name("last_name", v)).transpose()?;
        let birth_date = patch
            .birth_date
            .map(|v| parse_optional_date("birth_date", v.as_deref()))
            .transpose()?;
        let death_date = patch
            .death_date
            .map(|v| parse_optional_date("death_date", v.as_deref()))
            .transpose()?;
        if let Some(Some(order)) = patch.birth_order {
            check_birth_order(order)?;
        }

        if let Some(v) = first_name {
            self.first_name = v;
        }
        if let Some(v) = last_name {
            self.last_name = v;
        }
        if let Some(v) = birth_date {
            self.birth_date = v;
        }
        if let Some(v) = death_date {
            self.death_date = v;
        }
        if let Some(v) = patch.gender {
            self.gender = v;
        }

        macro_rules! set_text {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = patch.$field {
                    self.$field = clean_text(v);
                })*
            };
        }
        set_text!(
            middle_name,
            maiden_name,
            nickname,
            birth_place,
            birth_country,
            death_place,
            death_country,
            death_cause,
            burial_place,
            occupation,
            education,
            religion,
            nationality,
            email,
            phone,
            address,
            biography,
            notes,
        );

        if let Some(v) = patch.birth_date_approximate {
            self.birth_date_approximate = v;
        }
        if let Some(v) = patch.death_date_approximate {
            self.death_date_approximate = v;
        }
        if let Some(v) = patch.death_date_unknown {
            self.death_date_unknown = v;
        }
        if let Some(v) = patch.custom_fields {
            self.custom_fields = v;
        }
        if let Some(v) = patch.parent_family_id {
            self.parent_family_id = v;
        }
        if let Some(v) = patch.adoptive_family_id {
            self.adoptive_family_id = v;
        }
        if let Some(v) = patch.is_twin {
            self.is_twin = v;
        }
        if let Some(v) = patch.birth_order {
            self.birth_order = v;
        }

        self.updated_at = now;
        Ok(())
    }
}

fn required_name(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn check_birth_order(order: i32) -> Result<()> {
    if order < 1 {
        return Err(CoreError::Validation(
            "birth_order must be a positive number".to_string(),
        ));
    }
    Ok(())
}

/// Payload for creating a person
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersonInput {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub maiden_name: Option<String>,
    pub nickname: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<String>,
    pub birth_date_approximate: bool,
    pub birth_place: Option<String>,
    pub birth_country: Option<String>,
    pub death_date: Option<String>,
    pub death_date_approximate: bool,
    pub death_date_unknown: bool,
    pub death_place: Option<String>,
    pub death_country: Option<String>,
    pub death_cause: Option<String>,
    pub burial_place: Option<String>,
    pub occupation: Option<String>,
    pub education: Option<String>,
    pub religion: Option<String>,
    pub nationality: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub biography: Option<String>,
    pub notes: Option<String>,
    pub photo_path: Option<String>,
    pub custom_fields: Option<Map<String, Value>>,
    pub parent_family_id: Option<FamilyId>,
    pub adoptive_family_id: Option<FamilyId>,
    pub is_twin: bool,
    pub birth_order: Option<i32>,
}

impl PersonInput {
    /// Validate the payload into an unsaved person (id 0)
    pub fn build(self, now: DateTime<Utc>) -> Result<Person> {
        let first_name = required_name("first_name", self.first_name)?;
        let last_name = required_name("last_name", self.last_name)?;
        let birth_date = parse_optional_date("birth_date", self.birth_date.as_deref())?;
        let death_date = parse_optional_date("death_date", self.death_date.as_deref())?;
        if let Some(order) = self.birth_order {
            check_birth_order(order)?;
        }

        Ok(Person {
            id: 0,
            first_name,
            middle_name: clean_text(self.middle_name),
            last_name,
            maiden_name: clean_text(self.maiden_name),
            nickname: clean_text(self.nickname),
            gender: self.gender.unwrap_or_default(),
            birth_date,
            birth_date_approximate: self.birth_date_approximate,
            birth_place: clean_text(self.birth_place),
            birth_country: clean_text(self.birth_country),
            death_date,
            death_date_approximate: self.death_date_approximate,
            death_date_unknown: self.death_date_unknown,
            death_place: clean_text(self.death_place),
            death_country: clean_text(self.death_country),
            death_cause: clean_text(self.death_cause),
            burial_place: clean_text(self.burial_place),
            occupation: clean_text(self.occupation),
            education: clean_text(self.education),
            religion: clean_text(self.religion),
            nationality: clean_text(self.nationality),
            email: clean_text(self.email),
            phone: clean_text(self.phone),
            address: clean_text(self.address),
            biography: clean_text(self.biography),
            notes: clean_text(self.notes),
            photo_path: clean_text(self.photo_path),
            custom_fields: self.custom_fields.unwrap_or_default(),
            parent_family_id: self.parent_family_id,
            adoptive_family_id: self.adoptive_family_id,
            is_twin: self.is_twin,
            birth_order: self.birth_order,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Payload for updating a person. See [`crate::patch`] for the
/// absent / null / value convention.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonPatch {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub middle_name: Option<Option<String>>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub maiden_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub nickname: Option<Option<String>>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "double_option")]
    pub birth_date: Option<Option<String>>,
    #[serde(default)]
    pub birth_date_approximate: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub birth_place: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub birth_country: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub death_date: Option<Option<String>>,
    #[serde(default)]
    pub death_date_approximate: Option<bool>,
    #[serde(default)]
    pub death_date_unknown: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub death_place: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub death_country: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub death_cause: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub burial_place: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub occupation: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub education: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub religion: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub nationality: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub biography: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub custom_fields: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_family_id: Option<Option<FamilyId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub adoptive_family_id: Option<Option<FamilyId>>,
    #[serde(default)]
    pub is_twin: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub birth_order: Option<Option<i32>>,
}

impl PersonPatch {
    /// Family links this patch sets to a concrete id, for existence checks
    pub fn family_links(&self) -> Vec<FamilyId> {
        [self.parent_family_id, self.adoptive_family_id]
            .into_iter()
            .flatten()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn input(first: &str, last: &str) -> PersonInput {
        PersonInput {
            first_name: first.to_string(),
            last_name: last.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_requires_names() {
        assert!(input("", "Kovács").build(now()).is_err());
        assert!(input("Anna", "  ").build(now()).is_err());
        assert!(input("Anna", "Kovács").build(now()).is_ok());
    }

    #[test]
    fn test_names_put_family_name_first() {
        let mut person = input("Anna", "Kovács").build(now()).unwrap();
        assert_eq!(person.full_name(), "Kovács Anna");

        person.middle_name = Some("Mária".to_string());
        person.maiden_name = Some("Szabó".to_string());
        assert_eq!(person.full_name(), "Kovács Anna Mária");
        assert_eq!(person.display_name(), "Kovács Anna Mária (born Szabó)");
    }

    #[test]
    fn test_age_and_alive() {
        let mut person = input("Béla", "Nagy").build(now()).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(person.age(today), None);
        assert!(person.is_alive());

        person.birth_date = NaiveDate::from_ymd_opt(1950, 5, 10);
        assert_eq!(person.age(today), Some(73));

        person.death_date = NaiveDate::from_ymd_opt(2000, 5, 10);
        assert_eq!(person.age(today), Some(50));
        assert!(!person.is_alive());

        person.death_date = None;
        person.death_date_unknown = true;
        assert!(!person.is_alive());
    }

    #[test]
    fn test_input_rejects_bad_dates() {
        let mut bad = input("Anna", "Kovács");
        bad.birth_date = Some("1990/01/01".to_string());
        assert!(matches!(
            bad.build(now()),
            Err(CoreError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_input_defaults_from_json() {
        let parsed: PersonInput =
            serde_json::from_value(json!({"first_name": "Anna", "last_name": "Kovács"})).unwrap();
        let person = parsed.build(now()).unwrap();
        assert_eq!(person.gender, Gender::Unknown);
        assert!(person.custom_fields.is_empty());
        assert!(!person.is_twin);
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let mut person = input("Anna", "Kovács").build(now()).unwrap();
        person.birth_place = Some("Pécs".to_string());
        person.occupation = Some("teacher".to_string());

        let patch: PersonPatch = serde_json::from_value(json!({
            "birth_place": null,
            "birth_date": "1961-07-04",
            "gender": "female"
        }))
        .unwrap();
        person.apply_patch(patch, now()).unwrap();

        assert_eq!(person.birth_place, None);
        assert_eq!(person.occupation.as_deref(), Some("teacher"));
        assert_eq!(person.birth_date, NaiveDate::from_ymd_opt(1961, 7, 4));
        assert_eq!(person.gender, Gender::Female);
    }

    #[test]
    fn test_patch_is_all_or_nothing() {
        let mut person = input("Anna", "Kovács").build(now()).unwrap();
        let patch: PersonPatch = serde_json::from_value(json!({
            "first_name": "Éva",
            "death_date": "yesterday"
        }))
        .unwrap();
        assert!(person.apply_patch(patch, now()).is_err());
        assert_eq!(person.first_name, "Anna");
    }

    #[test]
    fn test_gender_parsing() {
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("".parse::<Gender>().unwrap(), Gender::Unknown);
        assert!("robot".parse::<Gender>().is_err());
    }
}
