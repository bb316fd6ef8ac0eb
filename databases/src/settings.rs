//! Display settings, application key/value settings and node positions

use chrono::{DateTime, Utc};
use familytree_core::{NodePosition, PersonId, PositionInput, TreeSettings, TreeSettingsPatch};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::records::find_person;
use crate::{FamilyStore, Result, StoreError};

/// Key of the stored password hash in `app_settings`
pub const PASSWORD_HASH_KEY: &str = "password_hash";

fn load_tree_settings(conn: &Connection) -> Result<Option<TreeSettings>> {
    let row = conn
        .query_row(
            "SELECT id, data FROM tree_settings ORDER BY id LIMIT 1",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((id, data)) = row else {
        return Ok(None);
    };
    match serde_json::from_str::<TreeSettings>(&data) {
        Ok(mut settings) => {
            settings.id = id;
            Ok(Some(settings))
        }
        Err(e) => {
            warn!("Stored tree settings are unreadable, falling back to defaults: {e}");
            Ok(Some(TreeSettings {
                id,
                ..TreeSettings::default()
            }))
        }
    }
}

impl FamilyStore {
    /// Current display settings, created with defaults on first access
    pub fn tree_settings(&self, now: DateTime<Utc>) -> Result<TreeSettings> {
        let conn = self.lock()?;
        if let Some(settings) = load_tree_settings(&conn)? {
            return Ok(settings);
        }
        let mut settings = TreeSettings::default();
        conn.execute(
            "INSERT INTO tree_settings (name, data, updated_at) VALUES (?1, ?2, ?3)",
            params![settings.name, serde_json::to_string(&settings)?, now],
        )?;
        settings.id = conn.last_insert_rowid();
        debug!("Created default tree settings");
        Ok(settings)
    }

    pub fn update_tree_settings(
        &self,
        patch: TreeSettingsPatch,
        now: DateTime<Utc>,
    ) -> Result<TreeSettings> {
        let mut settings = self.tree_settings(now)?;
        let conn = self.lock()?;
        if let Some(Some(root)) = patch.default_root_person_id {
            if find_person(&conn, root)?.is_none() {
                return Err(StoreError::Invalid(format!("Person {root} does not exist")));
            }
        }
        settings.apply_patch(patch)?;
        conn.execute(
            "UPDATE tree_settings SET name = ?2, data = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                settings.id,
                settings.name,
                serde_json::to_string(&settings)?,
                now
            ],
        )?;
        info!("Tree settings updated");
        Ok(settings)
    }

    pub fn app_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn set_app_setting(&self, key: &str, value: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        debug!("App setting '{key}' stored");
        Ok(())
    }

    /// Saved positions for one root person
    pub fn positions(&self, root_person_id: PersonId) -> Result<Vec<NodePosition>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, person_id, root_person_id, x, y, updated_at FROM node_positions
             WHERE root_person_id = ?1 ORDER BY person_id",
        )?;
        let rows = stmt.query_map(params![root_person_id], |row| {
            Ok(NodePosition {
                id: row.get(0)?,
                person_id: row.get(1)?,
                root_person_id: row.get(2)?,
                x: row.get(3)?,
                y: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Upsert positions for one root. All positions are validated before
    /// anything is written. Returns the number saved.
    pub fn save_positions(
        &self,
        root_person_id: PersonId,
        positions: &[PositionInput],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        for position in positions {
            position.validate()?;
        }
        let mut conn = self.lock()?;
        let mut required: BTreeSet<PersonId> = positions.iter().map(|p| p.person_id).collect();
        required.insert(root_person_id);
        for id in required {
            if find_person(&conn, id)?.is_none() {
                return Err(StoreError::Invalid(format!("Person {id} does not exist")));
            }
        }

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO node_positions (person_id, root_person_id, x, y, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(person_id, root_person_id)
                 DO UPDATE SET x = excluded.x, y = excluded.y, updated_at = excluded.updated_at",
            )?;
            for position in positions {
                stmt.execute(params![
                    position.person_id,
                    root_person_id,
                    position.x,
                    position.y,
                    now
                ])?;
            }
        }
        tx.commit()?;
        debug!("Saved {} positions for root {root_person_id}", positions.len());
        Ok(positions.len())
    }

    /// Forget every saved position of one root. Returns the number removed.
    pub fn reset_positions(&self, root_person_id: PersonId) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM node_positions WHERE root_person_id = ?1",
            params![root_person_id],
        )?;
        info!("Reset {removed} positions for root {root_person_id}");
        Ok(removed)
    }
}
