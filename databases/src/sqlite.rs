//! SQLite connection and schema for the family tree store
//!
//! A single connection is shared behind a mutex. Record operations live in
//! the sibling modules as further `impl FamilyStore` blocks.

use chrono::{DateTime, NaiveDate, Utc};
use familytree_core::{CoreError, Document, Event, Family, Person};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::{EntityKind, Result, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    last_name TEXT NOT NULL,
    maiden_name TEXT,
    nickname TEXT,
    gender TEXT NOT NULL DEFAULT 'unknown',
    birth_date TEXT,
    birth_date_approximate INTEGER NOT NULL DEFAULT 0,
    birth_place TEXT,
    birth_country TEXT,
    death_date TEXT,
    death_date_approximate INTEGER NOT NULL DEFAULT 0,
    death_date_unknown INTEGER NOT NULL DEFAULT 0,
    death_place TEXT,
    death_country TEXT,
    death_cause TEXT,
    burial_place TEXT,
    occupation TEXT,
    education TEXT,
    religion TEXT,
    nationality TEXT,
    email TEXT,
    phone TEXT,
    address TEXT,
    biography TEXT,
    notes TEXT,
    photo_path TEXT,
    custom_fields TEXT,
    parent_family_id INTEGER REFERENCES families(id) ON DELETE SET NULL,
    adoptive_family_id INTEGER REFERENCES families(id) ON DELETE SET NULL,
    is_twin INTEGER NOT NULL DEFAULT 0,
    birth_order INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS families (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person1_id INTEGER REFERENCES persons(id) ON DELETE SET NULL,
    person2_id INTEGER REFERENCES persons(id) ON DELETE SET NULL,
    relationship_type TEXT NOT NULL DEFAULT 'marriage',
    status TEXT NOT NULL DEFAULT 'active',
    start_date TEXT,
    end_date TEXT,
    end_reason TEXT,
    marriage_place TEXT,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    event_type TEXT NOT NULL,
    event_date TEXT,
    event_place TEXT,
    description TEXT
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER REFERENCES persons(id) ON DELETE SET NULL,
    document_type TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    file_path TEXT NOT NULL,
    file_type TEXT NOT NULL,
    upload_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deleted_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    deleted_at TEXT NOT NULL,
    UNIQUE (entity_type, entity_id)
);

CREATE TABLE IF NOT EXISTS tree_settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS app_settings (
    key TEXT PRIMARY KEY,
    value TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS node_positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    root_person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    x REAL NOT NULL,
    y REAL NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (person_id, root_person_id)
);

CREATE TABLE IF NOT EXISTS backup_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    trigger TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_persons_parent_family ON persons(parent_family_id);
CREATE INDEX IF NOT EXISTS idx_persons_adoptive_family ON persons(adoptive_family_id);
CREATE INDEX IF NOT EXISTS idx_families_person1 ON families(person1_id);
CREATE INDEX IF NOT EXISTS idx_families_person2 ON families(person2_id);
CREATE INDEX IF NOT EXISTS idx_events_person ON events(person_id);
CREATE INDEX IF NOT EXISTS idx_documents_person ON documents(person_id);
CREATE INDEX IF NOT EXISTS idx_positions_root ON node_positions(root_person_id);
";

/// SQLite-backed family tree store
#[derive(Clone)]
pub struct FamilyStore {
    connection: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl FamilyStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        info!("Opening family tree database: {}", path.display());

        let conn = Connection::open(&path)?;
        Self::from_connection(conn, Some(path))
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(SCHEMA)?;
        debug!("Family tree schema ready");

        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// Location of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Round-trip a trivial query
    pub fn test_connection(&self) -> Result<bool> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT 1", [], |_| Ok(())).is_ok())
    }
}

/// SQL condition excluding soft-deleted rows of `kind`, for a table aliased `alias`
pub(crate) fn active_filter(kind: EntityKind, alias: &str) -> String {
    format!(
        "NOT EXISTS (SELECT 1 FROM deleted_records d WHERE d.entity_type = '{}' AND d.entity_id = {alias}.id)",
        kind.as_str()
    )
}

/// Read a text column through `FromStr`
fn parse_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = CoreError>,
{
    let raw: String = row.get(column)?;
    raw.parse().map_err(|e| {
        let idx = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn json_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Map<String, Value>> {
    let raw: Option<String> = row.get(column)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Map::new()),
        Some(text) => serde_json::from_str(text).map_err(|e| {
            let idx = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        }),
    }
}

pub(crate) const PERSON_COLUMNS: &str = "p.id, p.first_name, p.middle_name, p.last_name, \
    p.maiden_name, p.nickname, p.gender, p.birth_date, p.birth_date_approximate, p.birth_place, \
    p.birth_country, p.death_date, p.death_date_approximate, p.death_date_unknown, p.death_place, \
    p.death_country, p.death_cause, p.burial_place, p.occupation, p.education, p.religion, \
    p.nationality, p.email, p.phone, p.address, p.biography, p.notes, p.photo_path, \
    p.custom_fields, p.parent_family_id, p.adoptive_family_id, p.is_twin, p.birth_order, \
    p.created_at, p.updated_at";

pub(crate) fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        middle_name: row.get("middle_name")?,
        last_name: row.get("last_name")?,
        maiden_name: row.get("maiden_name")?,
        nickname: row.get("nickname")?,
        gender: parse_column(row, "gender")?,
        birth_date: row.get::<_, Option<NaiveDate>>("birth_date")?,
        birth_date_approximate: row.get("birth_date_approximate")?,
        birth_place: row.get("birth_place")?,
        birth_country: row.get("birth_country")?,
        death_date: row.get::<_, Option<NaiveDate>>("death_date")?,
        death_date_approximate: row.get("death_date_approximate")?,
        death_date_unknown: row.get("death_date_unknown")?,
        death_place: row.get("death_place")?,
        death_country: row.get("death_country")?,
        death_cause: row.get("death_cause")?,
        burial_place: row.get("burial_place")?,
        occupation: row.get("occupation")?,
        education: row.get("education")?,
        religion: row.get("religion")?,
        nationality: row.get("nationality")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        biography: row.get("biography")?,
        notes: row.get("notes")?,
        photo_path: row.get("photo_path")?,
        custom_fields: json_column(row, "custom_fields")?,
        parent_family_id: row.get("parent_family_id")?,
        adoptive_family_id: row.get("adoptive_family_id")?,
        is_twin: row.get("is_twin")?,
        birth_order: row.get("birth_order")?,
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
        updated_at: row.get::<_, DateTime<Utc>>("updated_at")?,
    })
}

pub(crate) const FAMILY_COLUMNS: &str = "f.id, f.person1_id, f.person2_id, f.relationship_type, \
    f.status, f.start_date, f.end_date, f.end_reason, f.marriage_place, f.notes";

pub(crate) fn family_from_row(row: &Row<'_>) -> rusqlite::Result<Family> {
    Ok(Family {
        id: row.get("id")?,
        person1_id: row.get("person1_id")?,
        person2_id: row.get("person2_id")?,
        relationship_type: parse_column(row, "relationship_type")?,
        status: parse_column(row, "status")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        end_reason: row.get("end_reason")?,
        marriage_place: row.get("marriage_place")?,
        notes: row.get("notes")?,
    })
}

pub(crate) const EVENT_COLUMNS: &str =
    "e.id, e.person_id, e.event_type, e.event_date, e.event_place, e.description";

pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get("id")?,
        person_id: row.get("person_id")?,
        event_type: row.get("event_type")?,
        event_date: row.get("event_date")?,
        event_place: row.get("event_place")?,
        description: row.get("description")?,
    })
}

pub(crate) const DOCUMENT_COLUMNS: &str = "doc.id, doc.person_id, doc.document_type, doc.title, \
    doc.description, doc.file_path, doc.file_type, doc.upload_date";

pub(crate) fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get("id")?,
        person_id: row.get("person_id")?,
        document_type: row.get("document_type")?,
        title: row.get("title")?,
        description: row.get("description")?,
        file_path: row.get("file_path")?,
        file_type: parse_column(row, "file_type")?,
        upload_date: row.get("upload_date")?,
    })
}
