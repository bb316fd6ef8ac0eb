//! Summary statistics over the active tree

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::{FamilyGraph, Gender, PersonView};

/// Years per generation when estimating depth from birth years
const GENERATION_YEARS: i32 = 25;

#[derive(Debug, Clone, Serialize)]
pub struct TreeStats {
    pub total_persons: usize,
    #[serde(rename = "living_persons")]
    pub living: usize,
    #[serde(rename = "deceased_persons")]
    pub deceased: usize,
    #[serde(rename = "male_count")]
    pub male: usize,
    #[serde(rename = "female_count")]
    pub female: usize,
    #[serde(rename = "unknown_gender_count")]
    pub unknown_gender: usize,
    #[serde(rename = "marriages_count")]
    pub total_families: usize,
    #[serde(rename = "estimated_generations")]
    pub generations: i32,
    pub oldest_living: Option<PersonView>,
}

impl TreeStats {
    pub fn compute(graph: &FamilyGraph, today: NaiveDate) -> Self {
        let mut stats = TreeStats {
            total_persons: 0,
            living: 0,
            deceased: 0,
            male: 0,
            female: 0,
            unknown_gender: 0,
            total_families: graph.families().count(),
            generations: 1,
            oldest_living: None,
        };

        let mut years: Option<(i32, i32)> = None;
        let mut oldest = None;

        for person in graph.persons() {
            stats.total_persons += 1;
            if person.is_alive() {
                stats.living += 1;
                if let Some(birth) = person.birth_date {
                    if oldest.map_or(true, |(b, _)| birth < b) {
                        oldest = Some((birth, person.id));
                    }
                }
            } else {
                stats.deceased += 1;
            }
            match person.gender {
                Gender::Male => stats.male += 1,
                Gender::Female => stats.female += 1,
                Gender::Other | Gender::Unknown => stats.unknown_gender += 1,
            }
            if let Some(year) = person.birth_date.map(|d| d.year()) {
                years = Some(match years {
                    Some((lo, hi)) => (lo.min(year), hi.max(year)),
                    None => (year, year),
                });
            }
        }

        if let Some((earliest, latest)) = years {
            stats.generations = ((latest - earliest) / GENERATION_YEARS + 1).max(1);
        }
        stats.oldest_living = oldest.and_then(|(_, id)| graph.person_view(id, today));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Person, PersonInput};
    use chrono::Utc;

    fn person(id: i64, gender: Gender, born: Option<&str>, died: Option<&str>) -> Person {
        let mut p = PersonInput {
            first_name: format!("P{id}"),
            last_name: "Varga".to_string(),
            gender: Some(gender),
            birth_date: born.map(str::to_string),
            death_date: died.map(str::to_string),
            ..Default::default()
        }
        .build(Utc::now())
        .unwrap();
        p.id = id;
        p
    }

    #[test]
    fn test_empty_tree() {
        let graph = FamilyGraph::new(vec![], vec![]);
        let stats = TreeStats::compute(&graph, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(stats.total_persons, 0);
        assert_eq!(stats.generations, 1);
        assert!(stats.oldest_living.is_none());
    }

    #[test]
    fn test_counts_and_generations() {
        let persons = vec![
            person(1, Gender::Male, Some("1900-01-01"), Some("1970-01-01")),
            person(2, Gender::Female, Some("1930-06-01"), None),
            person(3, Gender::Female, Some("1960-06-01"), None),
            person(4, Gender::Unknown, Some("1990-01-01"), None),
        ];
        let graph = FamilyGraph::new(persons, vec![]);
        let stats = TreeStats::compute(&graph, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        assert_eq!(stats.total_persons, 4);
        assert_eq!(stats.living, 3);
        assert_eq!(stats.deceased, 1);
        assert_eq!(stats.male, 1);
        assert_eq!(stats.female, 2);
        assert_eq!(stats.unknown_gender, 1);
        // 1990 - 1900 = 90 years, 90 / 25 + 1
        assert_eq!(stats.generations, 4);
        assert_eq!(stats.oldest_living.as_ref().unwrap().person.id, 2);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_persons"], 4);
        assert_eq!(json["living_persons"], 3);
        assert_eq!(json["deceased_persons"], 1);
        assert_eq!(json["male_count"], 1);
        assert_eq!(json["female_count"], 2);
        assert_eq!(json["unknown_gender_count"], 1);
        assert_eq!(json["marriages_count"], 0);
        assert_eq!(json["estimated_generations"], 4);
        assert_eq!(json["oldest_living"]["id"], 2);
    }
}
