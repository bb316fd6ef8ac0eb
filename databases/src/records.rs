//! Person, family, event and document records
//!
//! Reads only ever return active rows; soft-deleted rows are visible through
//! the trash alone.

use chrono::{DateTime, Utc};
use familytree_core::exchange::{IdMap, ImportBundle};
use familytree_core::{
    Document, Event, EventInput, ExportBundle, Family, FamilyGraph, FamilyId,
    FamilyInput, FamilyPatch, ImportSummary, Person, PersonId, PersonInput, PersonPatch,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::sqlite::{
    active_filter, document_from_row, event_from_row, family_from_row, person_from_row,
    DOCUMENT_COLUMNS, EVENT_COLUMNS, FAMILY_COLUMNS, PERSON_COLUMNS,
};
use crate::{EntityKind, FamilyStore, Result, StoreError};

/// Upper bound on search results
pub const SEARCH_LIMIT: usize = 20;

/// Shortest accepted search query, in characters
pub const SEARCH_MIN_CHARS: usize = 2;

pub(crate) fn query_persons(conn: &Connection) -> Result<Vec<Person>> {
    let sql = format!(
        "SELECT {PERSON_COLUMNS} FROM persons p WHERE {} ORDER BY p.id",
        active_filter(EntityKind::Person, "p")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], person_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn find_person(conn: &Connection, id: PersonId) -> Result<Option<Person>> {
    let sql = format!(
        "SELECT {PERSON_COLUMNS} FROM persons p WHERE p.id = ?1 AND {}",
        active_filter(EntityKind::Person, "p")
    );
    Ok(conn.query_row(&sql, params![id], person_from_row).optional()?)
}

pub(crate) fn query_families(conn: &Connection) -> Result<Vec<Family>> {
    let sql = format!(
        "SELECT {FAMILY_COLUMNS} FROM families f WHERE {} ORDER BY f.id",
        active_filter(EntityKind::Family, "f")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], family_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn find_family(conn: &Connection, id: FamilyId) -> Result<Option<Family>> {
    let sql = format!(
        "SELECT {FAMILY_COLUMNS} FROM families f WHERE f.id = ?1 AND {}",
        active_filter(EntityKind::Family, "f")
    );
    Ok(conn.query_row(&sql, params![id], family_from_row).optional()?)
}

pub(crate) fn find_event(conn: &Connection, id: i64) -> Result<Option<Event>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = ?1 AND {}",
        active_filter(EntityKind::Event, "e")
    );
    Ok(conn.query_row(&sql, params![id], event_from_row).optional()?)
}

pub(crate) fn find_document(conn: &Connection, id: i64) -> Result<Option<Document>> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents doc WHERE doc.id = ?1 AND {}",
        active_filter(EntityKind::Document, "doc")
    );
    Ok(conn.query_row(&sql, params![id], document_from_row).optional()?)
}

fn require_person(conn: &Connection, id: PersonId) -> Result<()> {
    match find_person(conn, id)? {
        Some(_) => Ok(()),
        None => Err(StoreError::Invalid(format!("Person {id} does not exist"))),
    }
}

fn require_family(conn: &Connection, id: FamilyId) -> Result<()> {
    match find_family(conn, id)? {
        Some(_) => Ok(()),
        None => Err(StoreError::Invalid(format!("Family {id} does not exist"))),
    }
}

fn insert_person(conn: &Connection, p: &Person) -> Result<PersonId> {
    let custom_fields = if p.custom_fields.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&p.custom_fields)?)
    };
    conn.execute(
        "INSERT INTO persons (
            first_name, middle_name, last_name, maiden_name, nickname, gender,
            birth_date, birth_date_approximate, birth_place, birth_country,
            death_date, death_date_approximate, death_date_unknown, death_place,
            death_country, death_cause, burial_place, occupation, education,
            religion, nationality, email, phone, address, biography, notes,
            photo_path, custom_fields, parent_family_id, adoptive_family_id,
            is_twin, birth_order, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                  ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                  ?31, ?32, ?33, ?34)",
        params![
            p.first_name,
            p.middle_name,
            p.last_name,
            p.maiden_name,
            p.nickname,
            p.gender.as_str(),
            p.birth_date,
            p.birth_date_approximate,
            p.birth_place,
            p.birth_country,
            p.death_date,
            p.death_date_approximate,
            p.death_date_unknown,
            p.death_place,
            p.death_country,
            p.death_cause,
            p.burial_place,
            p.occupation,
            p.education,
            p.religion,
            p.nationality,
            p.email,
            p.phone,
            p.address,
            p.biography,
            p.notes,
            p.photo_path,
            custom_fields,
            p.parent_family_id,
            p.adoptive_family_id,
            p.is_twin,
            p.birth_order,
            p.created_at,
            p.updated_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn write_person(conn: &Connection, p: &Person) -> Result<()> {
    let custom_fields = if p.custom_fields.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&p.custom_fields)?)
    };
    conn.execute(
        "UPDATE persons SET
            first_name = ?2, middle_name = ?3, last_name = ?4, maiden_name = ?5,
            nickname = ?6, gender = ?7, birth_date = ?8, birth_date_approximate = ?9,
            birth_place = ?10, birth_country = ?11, death_date = ?12,
            death_date_approximate = ?13, death_date_unknown = ?14, death_place = ?15,
            death_country = ?16, death_cause = ?17, burial_place = ?18, occupation = ?19,
            education = ?20, religion = ?21, nationality = ?22, email = ?23, phone = ?24,
            address = ?25, biography = ?26, notes = ?27, photo_path = ?28,
            custom_fields = ?29, parent_family_id = ?30, adoptive_family_id = ?31,
            is_twin = ?32, birth_order = ?33, updated_at = ?34
         WHERE id = ?1",
        params![
            p.id,
            p.first_name,
            p.middle_name,
            p.last_name,
            p.maiden_name,
            p.nickname,
            p.gender.as_str(),
            p.birth_date,
            p.birth_date_approximate,
            p.birth_place,
            p.birth_country,
            p.death_date,
            p.death_date_approximate,
            p.death_date_unknown,
            p.death_place,
            p.death_country,
            p.death_cause,
            p.burial_place,
            p.occupation,
            p.education,
            p.religion,
            p.nationality,
            p.email,
            p.phone,
            p.address,
            p.biography,
            p.notes,
            p.photo_path,
            custom_fields,
            p.parent_family_id,
            p.adoptive_family_id,
            p.is_twin,
            p.birth_order,
            p.updated_at,
        ],
    )?;
    Ok(())
}

fn insert_family(conn: &Connection, f: &Family, now: DateTime<Utc>) -> Result<FamilyId> {
    conn.execute(
        "INSERT INTO families (person1_id, person2_id, relationship_type, status, start_date,
                               end_date, end_reason, marriage_place, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            f.person1_id,
            f.person2_id,
            f.relationship_type.as_str(),
            f.status.as_str(),
            f.start_date,
            f.end_date,
            f.end_reason,
            f.marriage_place,
            f.notes,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_event(conn: &Connection, e: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (person_id, event_type, event_date, event_place, description)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![e.person_id, e.event_type, e.event_date, e.event_place, e.description],
    )?;
    Ok(conn.last_insert_rowid())
}

impl FamilyStore {
    // Persons

    pub fn list_persons(&self) -> Result<Vec<Person>> {
        let conn = self.lock()?;
        query_persons(&conn)
    }

    pub fn get_person(&self, id: PersonId) -> Result<Option<Person>> {
        let conn = self.lock()?;
        find_person(&conn, id)
    }

    pub fn create_person(&self, input: PersonInput, now: DateTime<Utc>) -> Result<Person> {
        let mut person = input.build(now)?;
        let conn = self.lock()?;
        for fid in [person.parent_family_id, person.adoptive_family_id]
            .into_iter()
            .flatten()
        {
            require_family(&conn, fid)?;
        }
        person.id = insert_person(&conn, &person)?;
        info!("Created person {}: {}", person.id, person.full_name());
        Ok(person)
    }

    pub fn update_person(
        &self,
        id: PersonId,
        patch: PersonPatch,
        now: DateTime<Utc>,
    ) -> Result<Person> {
        let conn = self.lock()?;
        let mut person =
            find_person(&conn, id)?.ok_or_else(|| StoreError::not_found(EntityKind::Person, id))?;
        for fid in patch.family_links() {
            let family = find_family(&conn, fid)?
                .ok_or_else(|| StoreError::Invalid(format!("Family {fid} does not exist")))?;
            if family.has_partner(id) {
                return Err(StoreError::Invalid(
                    "A person cannot be a child of their own family".to_string(),
                ));
            }
        }
        person.apply_patch(patch, now)?;
        write_person(&conn, &person)?;
        debug!("Updated person {id}");
        Ok(person)
    }

    pub fn set_person_photo(&self, id: PersonId, photo_path: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        if find_person(&conn, id)?.is_none() {
            return Err(StoreError::not_found(EntityKind::Person, id));
        }
        conn.execute(
            "UPDATE persons SET photo_path = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, photo_path, now],
        )?;
        Ok(())
    }

    /// Case-insensitive substring match over first, last, maiden and nick
    /// names. Queries under two characters yield nothing.
    pub fn search_persons(&self, query: &str) -> Result<Vec<Person>> {
        let query = query.trim();
        if query.chars().count() < SEARCH_MIN_CHARS {
            return Ok(Vec::new());
        }
        let pattern = format!(
            "%{}%",
            query
                .to_lowercase()
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM persons p WHERE {} AND (
                lower(p.first_name) LIKE ?1 ESCAPE '\\'
                OR lower(p.last_name) LIKE ?1 ESCAPE '\\'
                OR lower(coalesce(p.maiden_name, '')) LIKE ?1 ESCAPE '\\'
                OR lower(coalesce(p.nickname, '')) LIKE ?1 ESCAPE '\\'
             ) ORDER BY p.last_name, p.first_name, p.id LIMIT {SEARCH_LIMIT}",
            active_filter(EntityKind::Person, "p")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern], person_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Families

    pub fn list_families(&self) -> Result<Vec<Family>> {
        let conn = self.lock()?;
        query_families(&conn)
    }

    pub fn get_family(&self, id: FamilyId) -> Result<Option<Family>> {
        let conn = self.lock()?;
        find_family(&conn, id)
    }

    pub fn create_family(&self, input: FamilyInput, now: DateTime<Utc>) -> Result<Family> {
        let mut family = input.build()?;
        let conn = self.lock()?;
        for pid in family.partner_ids() {
            require_person(&conn, pid)?;
        }
        family.id = insert_family(&conn, &family, now)?;
        info!(
            "Created family {} ({:?} + {:?})",
            family.id, family.person1_id, family.person2_id
        );
        Ok(family)
    }

    pub fn update_family(&self, id: FamilyId, patch: FamilyPatch) -> Result<Family> {
        let conn = self.lock()?;
        let mut family =
            find_family(&conn, id)?.ok_or_else(|| StoreError::not_found(EntityKind::Family, id))?;
        // partners are only checked when the update names them
        let partners_changed = patch.person1_id.is_some() || patch.person2_id.is_some();
        family.apply_patch(patch)?;
        if partners_changed {
            for pid in family.partner_ids() {
                require_person(&conn, pid)?;
            }
        }
        conn.execute(
            "UPDATE families SET person1_id = ?2, person2_id = ?3, relationship_type = ?4,
                status = ?5, start_date = ?6, end_date = ?7, end_reason = ?8,
                marriage_place = ?9, notes = ?10
             WHERE id = ?1",
            params![
                family.id,
                family.person1_id,
                family.person2_id,
                family.relationship_type.as_str(),
                family.status.as_str(),
                family.start_date,
                family.end_date,
                family.end_reason,
                family.marriage_place,
                family.notes,
            ],
        )?;
        debug!("Updated family {id}");
        Ok(family)
    }

    // Events

    pub fn list_events(&self, person_id: Option<PersonId>) -> Result<Vec<Event>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE {} AND (?1 IS NULL OR e.person_id = ?1)
             ORDER BY e.event_date IS NULL, e.event_date, e.id",
            active_filter(EntityKind::Event, "e")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![person_id], event_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_event(&self, id: i64) -> Result<Option<Event>> {
        let conn = self.lock()?;
        find_event(&conn, id)
    }

    pub fn create_event(&self, input: EventInput) -> Result<Event> {
        let mut event = input.build()?;
        let conn = self.lock()?;
        require_person(&conn, event.person_id)?;
        event.id = insert_event(&conn, &event)?;
        debug!("Created event {} for person {}", event.id, event.person_id);
        Ok(event)
    }

    // Documents

    pub fn list_documents(&self, person_id: Option<PersonId>) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents doc WHERE {} AND (?1 IS NULL OR doc.person_id = ?1)
             ORDER BY doc.upload_date DESC, doc.id DESC",
            active_filter(EntityKind::Document, "doc")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![person_id], document_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let conn = self.lock()?;
        find_document(&conn, id)
    }

    /// Record an already stored upload
    pub fn create_document(&self, mut document: Document) -> Result<Document> {
        let conn = self.lock()?;
        if let Some(pid) = document.person_id {
            require_person(&conn, pid)?;
        }
        conn.execute(
            "INSERT INTO documents (person_id, document_type, title, description, file_path,
                                    file_type, upload_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document.person_id,
                document.document_type,
                document.title,
                document.description,
                document.file_path,
                document.file_type.as_str(),
                document.upload_date,
            ],
        )?;
        document.id = conn.last_insert_rowid();
        info!("Stored document {}: {}", document.id, document.file_path);
        Ok(document)
    }

    // Whole tree

    /// Snapshot of all active persons and families
    pub fn load_graph(&self) -> Result<FamilyGraph> {
        let conn = self.lock()?;
        let persons = query_persons(&conn)?;
        let families = query_families(&conn)?;
        Ok(FamilyGraph::new(persons, families))
    }

    pub fn export_bundle(&self, now: DateTime<Utc>) -> Result<ExportBundle> {
        let conn = self.lock()?;
        let persons = query_persons(&conn)?;
        let families = query_families(&conn)?;
        drop(conn);
        let events = self.list_events(None)?;
        Ok(ExportBundle {
            persons,
            families,
            events,
            export_date: now,
        })
    }

    /// Create every record of `bundle` anew, rewiring links through the
    /// bundle's own ids. Runs in a single transaction.
    pub fn import_bundle(&self, bundle: ImportBundle, now: DateTime<Utc>) -> Result<ImportSummary> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut summary = ImportSummary::default();

        let mut person_ids = IdMap::default();
        let mut pending_links = Vec::new();
        for imported in bundle.persons {
            let mut input = imported.input;
            let links = (input.parent_family_id.take(), input.adoptive_family_id.take());
            let person = match input.build(now) {
                Ok(person) => person,
                Err(e) => {
                    warn!("Skipping imported person {:?}: {e}", imported.id);
                    summary.skipped += 1;
                    continue;
                }
            };
            let new_id = insert_person(&tx, &person)?;
            person_ids.insert(imported.id, new_id);
            pending_links.push((new_id, links));
            summary.persons += 1;
        }

        let mut family_ids = IdMap::default();
        for imported in bundle.families {
            let mut input = imported.input;
            input.person1_id = person_ids.resolve(input.person1_id);
            input.person2_id = person_ids.resolve(input.person2_id);
            let family = match input.build() {
                Ok(family) => family,
                Err(e) => {
                    warn!("Skipping imported family {:?}: {e}", imported.id);
                    summary.skipped += 1;
                    continue;
                }
            };
            let new_id = insert_family(&tx, &family, now)?;
            family_ids.insert(imported.id, new_id);
            summary.families += 1;
        }

        for (person_id, (parent, adoptive)) in pending_links {
            let parent = family_ids.resolve(parent);
            let adoptive = family_ids.resolve(adoptive);
            if parent.is_some() || adoptive.is_some() {
                tx.execute(
                    "UPDATE persons SET parent_family_id = ?2, adoptive_family_id = ?3 WHERE id = ?1",
                    params![person_id, parent, adoptive],
                )?;
            }
        }

        for imported in bundle.events {
            let mut input = imported.input;
            input.person_id = person_ids.resolve(input.person_id);
            match input.build() {
                Ok(event) => {
                    insert_event(&tx, &event)?;
                    summary.events += 1;
                }
                Err(e) => {
                    warn!("Skipping imported event {:?}: {e}", imported.id);
                    summary.skipped += 1;
                }
            }
        }

        tx.commit()?;
        info!(
            "Imported {} persons, {} families, {} events ({} skipped)",
            summary.persons, summary.families, summary.events, summary.skipped
        );
        Ok(summary)
    }
}
