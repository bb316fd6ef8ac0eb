//! Soft delete
//!
//! Deleting a record only adds a marker to `deleted_records`. The trash lists
//! markers, restoring removes one, and purging removes the marker together
//! with the row. Foreign keys take care of dependants on purge.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{EntityKind, FamilyStore, Result, StoreError};

/// One trashed record with a snapshot of its data
#[derive(Debug, Clone, Serialize)]
pub struct TrashEntry {
    pub id: i64,
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub deleted_at: DateTime<Utc>,
    /// Row data, `None` when the row itself is gone
    pub data: Option<Value>,
}

fn row_exists(conn: &Connection, kind: EntityKind, id: i64) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", kind.table());
    Ok(conn
        .query_row(&sql, params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Raw row of any kind, bypassing the soft-delete filter
fn row_snapshot(conn: &Connection, kind: EntityKind, id: i64) -> Result<Option<Value>> {
    use crate::sqlite::{
        document_from_row, event_from_row, family_from_row, person_from_row, DOCUMENT_COLUMNS,
        EVENT_COLUMNS, FAMILY_COLUMNS, PERSON_COLUMNS,
    };

    let value = match kind {
        EntityKind::Person => conn
            .query_row(
                &format!("SELECT {PERSON_COLUMNS} FROM persons p WHERE p.id = ?1"),
                params![id],
                person_from_row,
            )
            .optional()?
            .map(serde_json::to_value),
        EntityKind::Family => conn
            .query_row(
                &format!("SELECT {FAMILY_COLUMNS} FROM families f WHERE f.id = ?1"),
                params![id],
                family_from_row,
            )
            .optional()?
            .map(serde_json::to_value),
        EntityKind::Event => conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = ?1"),
                params![id],
                event_from_row,
            )
            .optional()?
            .map(serde_json::to_value),
        EntityKind::Document => conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents doc WHERE doc.id = ?1"),
                params![id],
                document_from_row,
            )
            .optional()?
            .map(serde_json::to_value),
    };
    Ok(value.transpose()?)
}

impl FamilyStore {
    /// Move a record to the trash. Deleting an already trashed record is a
    /// no-op; deleting a record that never existed is `NotFound`.
    pub fn soft_delete(&self, kind: EntityKind, id: i64, now: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        if !row_exists(&conn, kind, id)? {
            return Err(StoreError::not_found(kind, id));
        }
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO deleted_records (entity_type, entity_id, deleted_at)
             VALUES (?1, ?2, ?3)",
            params![kind.as_str(), id, now],
        )?;
        if inserted > 0 {
            info!("Moved {kind} {id} to trash");
        } else {
            debug!("{kind} {id} already in trash");
        }
        Ok(())
    }

    pub fn is_deleted(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT 1 FROM deleted_records WHERE entity_type = ?1 AND entity_id = ?2",
                params![kind.as_str(), id],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    /// Trash contents, newest first
    pub fn list_trash(&self) -> Result<Vec<TrashEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, entity_type, entity_id, deleted_at FROM deleted_records
             ORDER BY deleted_at DESC, id DESC",
        )?;
        let markers = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, DateTime<Utc>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(markers.len());
        for (id, entity_type, entity_id, deleted_at) in markers {
            let entity_type: EntityKind = entity_type.parse()?;
            entries.push(TrashEntry {
                id,
                entity_type,
                entity_id,
                deleted_at,
                data: row_snapshot(&conn, entity_type, entity_id)?,
            });
        }
        Ok(entries)
    }

    /// Take a record back out of the trash
    pub fn restore_deleted(&self, kind: EntityKind, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM deleted_records WHERE entity_type = ?1 AND entity_id = ?2",
            params![kind.as_str(), id],
        )?;
        if removed == 0 {
            return Err(StoreError::not_found(kind, id));
        }
        info!("Restored {kind} {id} from trash");
        Ok(())
    }

    /// Remove a record for good. Returns the stored file path for documents
    /// so the caller can remove the upload.
    pub fn purge(&self, kind: EntityKind, id: i64) -> Result<Option<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let file_path = match kind {
            EntityKind::Document => tx
                .query_row(
                    "SELECT file_path FROM documents WHERE id = ?1",
                    params![id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?,
            _ => None,
        };

        tx.execute(
            "DELETE FROM deleted_records WHERE entity_type = ?1 AND entity_id = ?2",
            params![kind.as_str(), id],
        )?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
        let removed = tx.execute(&sql, params![id])?;
        tx.commit()?;

        if removed > 0 {
            info!("Permanently deleted {kind} {id}");
        } else {
            debug!("Purge of {kind} {id} found no row");
        }
        Ok(file_path)
    }
}
