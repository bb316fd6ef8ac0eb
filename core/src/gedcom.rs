//! GEDCOM 5.5.1 export
//!
//! Writes a lineage-linked file with one INDI record per person and one FAM
//! record per family. Only the subset the service stores is emitted.

use chrono::NaiveDate;

use crate::{Family, FamilyGraph, Gender, Person};

/// Source system name written into the header
pub const SOURCE_NAME: &str = "FamilyTree";

/// GEDCOM date value, e.g. `04 JUL 1961`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string().to_uppercase()
}

fn person_xref(id: i64) -> String {
    format!("@I{id}@")
}

fn family_xref(id: i64) -> String {
    format!("@F{id}@")
}

/// Line values may not span lines
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct GedcomWriter {
    out: String,
}

impl GedcomWriter {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn line(&mut self, level: u8, tag: &str, value: Option<&str>) {
        self.out.push_str(&level.to_string());
        self.out.push(' ');
        self.out.push_str(tag);
        if let Some(value) = value {
            self.out.push(' ');
            self.out.push_str(&single_line(value));
        }
        self.out.push('\n');
    }

    fn record(&mut self, xref: &str, tag: &str) {
        self.out.push_str(&format!("0 {xref} {tag}\n"));
    }

    fn event(&mut self, tag: &str, date: Option<NaiveDate>, place: Option<&str>) {
        if date.is_none() && place.is_none() {
            return;
        }
        self.line(1, tag, None);
        if let Some(date) = date {
            self.line(2, "DATE", Some(&format_date(date)));
        }
        if let Some(place) = place {
            self.line(2, "PLAC", Some(place));
        }
    }

    fn finish(mut self) -> String {
        self.line(0, "TRLR", None);
        self.out
    }
}

/// Partners ordered as (husband, wife). Gender decides when it can,
/// otherwise person1 is written as HUSB.
fn husband_and_wife(graph: &FamilyGraph, family: &Family) -> (Option<i64>, Option<i64>) {
    let gender = |id: Option<i64>| id.and_then(|i| graph.person(i)).map(|p| p.gender);
    match (gender(family.person1_id), gender(family.person2_id)) {
        (Some(Gender::Female), Some(g)) if g != Gender::Female => {
            (family.person2_id, family.person1_id)
        }
        (Some(g), Some(Gender::Male)) if g != Gender::Male => (family.person2_id, family.person1_id),
        _ => (family.person1_id, family.person2_id),
    }
}

fn write_person(w: &mut GedcomWriter, graph: &FamilyGraph, person: &Person) {
    w.record(&person_xref(person.id), "INDI");
    w.line(
        1,
        "NAME",
        Some(&format!("{} /{}/", person.first_name, person.last_name)),
    );
    match person.gender {
        Gender::Male => w.line(1, "SEX", Some("M")),
        Gender::Female => w.line(1, "SEX", Some("F")),
        Gender::Other | Gender::Unknown => {}
    }
    w.event("BIRT", person.birth_date, person.birth_place.as_deref());
    if person.death_date.is_some() || person.death_place.is_some() {
        w.event("DEAT", person.death_date, person.death_place.as_deref());
    } else if person.death_date_unknown {
        w.line(1, "DEAT", Some("Y"));
    }
    if let Some(occupation) = person.occupation.as_deref() {
        w.line(1, "OCCU", Some(occupation));
    }
    if let Some(fid) = person.parent_family_id.filter(|f| graph.family(*f).is_some()) {
        w.line(1, "FAMC", Some(&family_xref(fid)));
    }
    if let Some(fid) = person.adoptive_family_id.filter(|f| graph.family(*f).is_some()) {
        w.line(1, "FAMC", Some(&family_xref(fid)));
        w.line(2, "PEDI", Some("adopted"));
    }
    for fid in graph.spouse_families(person.id) {
        w.line(1, "FAMS", Some(&family_xref(*fid)));
    }
}

fn write_family(w: &mut GedcomWriter, graph: &FamilyGraph, family: &Family) {
    w.record(&family_xref(family.id), "FAM");
    let (husband, wife) = husband_and_wife(graph, family);
    if let Some(id) = husband.filter(|i| graph.person(*i).is_some()) {
        w.line(1, "HUSB", Some(&person_xref(id)));
    }
    if let Some(id) = wife.filter(|i| graph.person(*i).is_some()) {
        w.line(1, "WIFE", Some(&person_xref(id)));
    }
    w.event("MARR", family.start_date, family.marriage_place.as_deref());
    for child in graph
        .family_children(family.id)
        .iter()
        .chain(graph.family_adopted_children(family.id))
    {
        w.line(1, "CHIL", Some(&person_xref(*child)));
    }
}

/// Render the whole graph as a GEDCOM document
pub fn export_gedcom(graph: &FamilyGraph) -> String {
    let mut w = GedcomWriter::new();
    w.line(0, "HEAD", None);
    w.line(1, "SOUR", Some(SOURCE_NAME));
    w.line(1, "GEDC", None);
    w.line(2, "VERS", Some("5.5.1"));
    w.line(2, "FORM", Some("LINEAGE-LINKED"));
    w.line(1, "CHAR", Some("UTF-8"));

    for person in graph.persons() {
        write_person(&mut w, graph, person);
    }
    for family in graph.families() {
        write_family(&mut w, graph, family);
    }
    w.finish()
}
