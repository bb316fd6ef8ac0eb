//! One-hop relationship derivation over persons and families
//!
//! Children are attached to families, never directly to parents. Parents of
//! a person are the partners of its parent family; children of a person are
//! the children of every family it is a partner in. Everything here is
//! derived from an in-memory snapshot of the active records.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{Family, FamilyId, Gender, Person, PersonId};

/// Identifier plus full name, used for compact references
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameRef {
    pub id: PersonId,
    pub name: String,
}

/// A person with derived name, age and relationship fields
#[derive(Debug, Clone, Serialize)]
pub struct PersonView {
    #[serde(flatten)]
    pub person: Person,
    pub full_name: String,
    pub display_name: String,
    pub age: Option<i32>,
    pub is_alive: bool,
    pub spouse_family_ids: Vec<FamilyId>,
    pub parents: Vec<NameRef>,
}

/// One-hop relatives of a person
#[derive(Debug, Clone, Default, Serialize)]
pub struct Relations {
    pub partners: Vec<NameRef>,
    pub children: Vec<NameRef>,
    pub siblings: Vec<NameRef>,
    pub half_siblings: Vec<NameRef>,
}

/// A family with partner names and its children
#[derive(Debug, Clone, Serialize)]
pub struct FamilyView {
    #[serde(flatten)]
    pub family: Family,
    pub person1_name: Option<String>,
    pub person2_name: Option<String>,
    pub children_ids: Vec<PersonId>,
    pub children: Vec<NameRef>,
    pub adopted_children_ids: Vec<PersonId>,
}

/// Flat projection of the whole tree for drawing
#[derive(Debug, Clone, Serialize)]
pub struct TreeData {
    pub nodes: Vec<TreeNode>,
    pub links: Vec<TreeLink>,
    pub families: Vec<FamilyView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: PersonId,
    pub name: String,
    pub display_name: String,
    pub gender: Gender,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub birth_place: Option<String>,
    pub occupation: Option<String>,
    pub photo: Option<String>,
    pub is_alive: bool,
    pub age: Option<i32>,
    pub parent_family_id: Option<FamilyId>,
    pub adoptive_family_id: Option<FamilyId>,
    pub spouse_family_ids: Vec<FamilyId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeLink {
    pub source: PersonId,
    pub target: PersonId,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    pub family_id: FamilyId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkKind {
    #[serde(rename = "partner")]
    Partner,
    #[serde(rename = "parent-child")]
    ParentChild,
    #[serde(rename = "adoptive")]
    Adoptive,
}

/// Indexed snapshot of persons and families
pub struct FamilyGraph {
    persons: BTreeMap<PersonId, Person>,
    families: BTreeMap<FamilyId, Family>,
    spouse_families: HashMap<PersonId, Vec<FamilyId>>,
    biological_children: HashMap<FamilyId, Vec<PersonId>>,
    adopted_children: HashMap<FamilyId, Vec<PersonId>>,
}

impl FamilyGraph {
    pub fn new(persons: Vec<Person>, families: Vec<Family>) -> Self {
        let persons: BTreeMap<_, _> = persons.into_iter().map(|p| (p.id, p)).collect();
        let families: BTreeMap<_, _> = families.into_iter().map(|f| (f.id, f)).collect();

        let mut spouse_families: HashMap<PersonId, Vec<FamilyId>> = HashMap::new();
        for family in families.values() {
            for partner in family.partner_ids() {
                spouse_families.entry(partner).or_default().push(family.id);
            }
        }

        let mut biological_children: HashMap<FamilyId, Vec<PersonId>> = HashMap::new();
        let mut adopted_children: HashMap<FamilyId, Vec<PersonId>> = HashMap::new();
        for person in persons.values() {
            if let Some(fid) = person.parent_family_id.filter(|f| families.contains_key(f)) {
                biological_children.entry(fid).or_default().push(person.id);
            }
            if let Some(fid) = person.adoptive_family_id.filter(|f| families.contains_key(f)) {
                adopted_children.entry(fid).or_default().push(person.id);
            }
        }

        // Siblings in birth order where known, otherwise by birth date, then id
        for children in biological_children.values_mut() {
            children.sort_by_key(|id| {
                let p = &persons[id];
                (p.birth_order.unwrap_or(i32::MAX), p.birth_date, p.id)
            });
        }

        Self {
            persons,
            families,
            spouse_families,
            biological_children,
            adopted_children,
        }
    }

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.persons.get(&id)
    }

    pub fn family(&self, id: FamilyId) -> Option<&Family> {
        self.families.get(&id)
    }

    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values()
    }

    /// Families in which `id` is a partner, ascending by id
    pub fn spouse_families(&self, id: PersonId) -> &[FamilyId] {
        self.spouse_families
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Biological children of a family
    pub fn family_children(&self, family_id: FamilyId) -> &[PersonId] {
        self.biological_children
            .get(&family_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn family_adopted_children(&self, family_id: FamilyId) -> &[PersonId] {
        self.adopted_children
            .get(&family_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn parents(&self, id: PersonId) -> Vec<PersonId> {
        self.persons
            .get(&id)
            .and_then(|p| p.parent_family_id)
            .and_then(|fid| self.families.get(&fid))
            .map(|f| {
                f.partner_ids()
                    .into_iter()
                    .filter(|pid| self.persons.contains_key(pid))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn children(&self, id: PersonId) -> Vec<PersonId> {
        let mut seen = BTreeSet::new();
        let mut children = Vec::new();
        for fid in self.spouse_families(id) {
            for child in self.family_children(*fid) {
                if seen.insert(*child) {
                    children.push(*child);
                }
            }
        }
        children
    }

    /// Other children of the same parent family
    pub fn siblings(&self, id: PersonId) -> Vec<PersonId> {
        let Some(fid) = self.persons.get(&id).and_then(|p| p.parent_family_id) else {
            return Vec::new();
        };
        self.family_children(fid)
            .iter()
            .copied()
            .filter(|c| *c != id)
            .collect()
    }

    /// Children sharing exactly one parent: children of the parents' other families
    pub fn half_siblings(&self, id: PersonId) -> Vec<PersonId> {
        let Some(own_family) = self.persons.get(&id).and_then(|p| p.parent_family_id) else {
            return Vec::new();
        };
        let full: BTreeSet<PersonId> = self.siblings(id).into_iter().collect();

        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        for parent in self.parents(id) {
            for fid in self.spouse_families(parent) {
                if *fid == own_family {
                    continue;
                }
                for child in self.family_children(*fid) {
                    if *child != id && !full.contains(child) && seen.insert(*child) {
                        result.push(*child);
                    }
                }
            }
        }
        result
    }

    fn name_ref(&self, id: PersonId) -> Option<NameRef> {
        self.persons.get(&id).map(|p| NameRef {
            id,
            name: p.full_name(),
        })
    }

    pub fn person_view(&self, id: PersonId, today: NaiveDate) -> Option<PersonView> {
        let person = self.persons.get(&id)?;
        Some(PersonView {
            full_name: person.full_name(),
            display_name: person.display_name(),
            age: person.age(today),
            is_alive: person.is_alive(),
            spouse_family_ids: self.spouse_families(id).to_vec(),
            parents: self
                .parents(id)
                .into_iter()
                .filter_map(|pid| self.name_ref(pid))
                .collect(),
            person: person.clone(),
        })
    }

    /// Partners across all spouse families, without repeats
    pub fn partners(&self, id: PersonId) -> Vec<PersonId> {
        let mut seen = BTreeSet::new();
        self.spouse_families(id)
            .iter()
            .filter_map(|fid| self.families.get(fid))
            .filter_map(|f| f.other_partner(id))
            .filter(|p| self.persons.contains_key(p) && seen.insert(*p))
            .collect()
    }

    pub fn relations(&self, id: PersonId) -> Relations {
        let names = |ids: Vec<PersonId>| -> Vec<NameRef> {
            ids.into_iter().filter_map(|i| self.name_ref(i)).collect()
        };
        Relations {
            partners: names(self.partners(id)),
            children: names(self.children(id)),
            siblings: names(self.siblings(id)),
            half_siblings: names(self.half_siblings(id)),
        }
    }

    /// Views of every person, ascending by id
    pub fn person_views(&self, today: NaiveDate) -> Vec<PersonView> {
        self.persons
            .keys()
            .filter_map(|id| self.person_view(*id, today))
            .collect()
    }

    pub fn family_view(&self, id: FamilyId) -> Option<FamilyView> {
        let family = self.families.get(&id)?;
        let name_of = |pid: Option<PersonId>| pid.and_then(|p| self.persons.get(&p)).map(Person::full_name);
        let children_ids = self.family_children(id).to_vec();
        Some(FamilyView {
            person1_name: name_of(family.person1_id),
            person2_name: name_of(family.person2_id),
            children: children_ids
                .iter()
                .filter_map(|c| self.name_ref(*c))
                .collect(),
            children_ids,
            adopted_children_ids: self.family_adopted_children(id).to_vec(),
            family: family.clone(),
        })
    }

    pub fn family_views(&self) -> Vec<FamilyView> {
        self.families
            .keys()
            .filter_map(|id| self.family_view(*id))
            .collect()
    }

    /// Nodes and links for the whole tree
    pub fn tree_data(&self, today: NaiveDate) -> TreeData {
        let nodes = self
            .persons
            .values()
            .map(|p| TreeNode {
                id: p.id,
                name: p.full_name(),
                display_name: p.display_name(),
                gender: p.gender,
                birth_date: p.birth_date,
                death_date: p.death_date,
                birth_place: p.birth_place.clone(),
                occupation: p.occupation.clone(),
                photo: p.photo_path.clone(),
                is_alive: p.is_alive(),
                age: p.age(today),
                parent_family_id: p.parent_family_id,
                adoptive_family_id: p.adoptive_family_id,
                spouse_family_ids: self.spouse_families(p.id).to_vec(),
            })
            .collect();

        let mut links = Vec::new();
        for family in self.families.values() {
            let partners: Vec<PersonId> = family
                .partner_ids()
                .into_iter()
                .filter(|pid| self.persons.contains_key(pid))
                .collect();
            if let [a, b] = partners.as_slice() {
                links.push(TreeLink {
                    source: *a,
                    target: *b,
                    kind: LinkKind::Partner,
                    family_id: family.id,
                });
            }
            for (children, kind) in [
                (self.family_children(family.id), LinkKind::ParentChild),
                (self.family_adopted_children(family.id), LinkKind::Adoptive),
            ] {
                for child in children {
                    for parent in &partners {
                        links.push(TreeLink {
                            source: *parent,
                            target: *child,
                            kind,
                            family_id: family.id,
                        });
                    }
                }
            }
        }

        TreeData {
            nodes,
            links,
            families: self.family_views(),
        }
    }
}
