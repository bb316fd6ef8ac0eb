//! Database backups
//!
//! Backups are online SQLite copies written next to the database under
//! `backups/`. Every backup is logged in `backup_logs`; the oldest files are
//! removed once `max_backups` is exceeded. Automatic backups after edits are
//! throttled so a burst of changes produces a single file.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::backup::Backup;
use rusqlite::{params, Connection, DatabaseName, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::FamilyStore;

pub const BACKUP_PREFIX: &str = "familytree_backup_";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Pages copied per step when restoring; `-1` copies everything at once
const RESTORE_PAGES_PER_STEP: i32 = -1;

/// What caused a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupTrigger {
    Auto,
    Manual,
    Scheduled,
}

impl BackupTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupTrigger::Auto => "auto",
            BackupTrigger::Manual => "manual",
            BackupTrigger::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for BackupTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupTrigger {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(BackupTrigger::Auto),
            "manual" => Ok(BackupTrigger::Manual),
            "scheduled" => Ok(BackupTrigger::Scheduled),
            other => Err(anyhow::anyhow!("Unknown backup trigger: {other}")),
        }
    }
}

/// Backup manager settings
#[derive(Debug, Clone, PartialEq)]
pub struct BackupConfig {
    /// Directory the backup files are written to
    pub dir: PathBuf,
    /// Oldest backups beyond this count are deleted
    pub max_backups: usize,
    /// Minimum time between two automatic backups
    pub auto_interval: Duration,
}

impl BackupConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_backups: 100,
            auto_interval: Duration::from_secs(300),
        }
    }
}

/// A logged backup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupInfo {
    pub id: i64,
    pub filename: String,
    pub file_size: i64,
    pub file_size_mb: f64,
    pub trigger: BackupTrigger,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Whether the file is still on disk
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupStats {
    pub total_backups: usize,
    pub total_size_mb: f64,
    pub max_backups: usize,
    pub last_backup: Option<BackupInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub restored_from: String,
    pub backup_created_at: DateTime<Utc>,
    /// Snapshot of the state that was replaced
    pub safety_backup: Option<BackupInfo>,
}

/// Raw `backup_logs` row
#[derive(Debug, Clone)]
struct LogRow {
    id: i64,
    filename: String,
    file_size: i64,
    trigger: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

fn round_mb(bytes: i64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

fn read_logs(conn: &Connection) -> Result<Vec<LogRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, filename, file_size, trigger, description, created_at FROM backup_logs
             ORDER BY created_at DESC, id DESC",
        )
        .map_err(|e| anyhow::anyhow!("Failed to prepare backup log query: {e}"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LogRow {
                id: row.get(0)?,
                filename: row.get(1)?,
                file_size: row.get(2)?,
                trigger: row.get(3)?,
                description: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .map_err(|e| anyhow::anyhow!("Failed to read backup logs: {e}"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| anyhow::anyhow!("Failed to read backup logs: {e}"))?;
    Ok(rows)
}

pub struct BackupManager {
    store: FamilyStore,
    config: BackupConfig,
    last_auto: Mutex<Option<Instant>>,
}

impl BackupManager {
    pub fn new(store: FamilyStore, config: BackupConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.dir).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create backup directory {}: {e}",
                config.dir.display()
            )
        })?;
        Ok(Self {
            store,
            config,
            last_auto: Mutex::new(None),
        })
    }

    pub fn backup_dir(&self) -> &Path {
        &self.config.dir
    }

    fn to_info(&self, row: LogRow) -> BackupInfo {
        let exists = self.config.dir.join(&row.filename).exists();
        let trigger = row.trigger.parse().unwrap_or_else(|_| {
            warn!("Backup {} has unknown trigger '{}'", row.id, row.trigger);
            BackupTrigger::Manual
        });
        BackupInfo {
            id: row.id,
            file_size_mb: round_mb(row.file_size),
            filename: row.filename,
            file_size: row.file_size,
            trigger,
            description: row.description,
            created_at: row.created_at,
            exists,
        }
    }

    /// A filename not yet used in the backup directory
    fn next_filename(&self, now: DateTime<Utc>) -> String {
        let stamp = now.format("%Y%m%d_%H%M%S_%3f");
        let mut filename = format!("{BACKUP_PREFIX}{stamp}.db");
        let mut n = 1;
        while self.config.dir.join(&filename).exists() {
            filename = format!("{BACKUP_PREFIX}{stamp}_{n}.db");
            n += 1;
        }
        filename
    }

    /// Write a backup of the live database and log it
    pub fn create_backup(
        &self,
        trigger: BackupTrigger,
        description: Option<&str>,
    ) -> Result<BackupInfo> {
        let backup = self.write_backup(trigger, description)?;
        if let Err(e) = self.cleanup_old_backups() {
            warn!("Failed to remove old backups: {e}");
        }
        self.get_backup(backup.id)?
            .ok_or_else(|| anyhow::anyhow!("Backup {} vanished after creation", backup.id))
    }

    /// Write and log a backup without pruning old ones
    fn write_backup(&self, trigger: BackupTrigger, description: Option<&str>) -> Result<BackupInfo> {
        let now = Utc::now();
        let filename = self.next_filename(now);
        let path = self.config.dir.join(&filename);

        let id = {
            let conn = self.store.lock()?;
            conn.backup(DatabaseName::Main, &path, None)
                .map_err(|e| anyhow::anyhow!("Failed to write backup {filename}: {e}"))?;
            let file_size = std::fs::metadata(&path)
                .map_err(|e| anyhow::anyhow!("Failed to stat backup {filename}: {e}"))?
                .len() as i64;
            conn.execute(
                "INSERT INTO backup_logs (filename, file_size, trigger, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![filename, file_size, trigger.as_str(), description, now],
            )
            .map_err(|e| anyhow::anyhow!("Failed to log backup {filename}: {e}"))?;
            conn.last_insert_rowid()
        };
        info!("Created {trigger} backup {filename}");

        self.get_backup(id)?
            .ok_or_else(|| anyhow::anyhow!("Backup {id} vanished after creation"))
    }

    /// Automatic backup after an edit; `None` when throttled
    pub fn auto_backup(&self, description: Option<&str>) -> Result<Option<BackupInfo>> {
        {
            let mut last = self
                .last_auto
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to acquire backup throttle lock: {e}"))?;
            if let Some(at) = *last {
                if at.elapsed() < self.config.auto_interval {
                    debug!("Automatic backup throttled");
                    return Ok(None);
                }
            }
            *last = Some(Instant::now());
        }
        self.create_backup(BackupTrigger::Auto, description).map(Some)
    }

    pub fn get_backup(&self, id: i64) -> Result<Option<BackupInfo>> {
        let conn = self.store.lock()?;
        let row = conn
            .query_row(
                "SELECT id, filename, file_size, trigger, description, created_at
                 FROM backup_logs WHERE id = ?1",
                params![id],
                |row| {
                    Ok(LogRow {
                        id: row.get(0)?,
                        filename: row.get(1)?,
                        file_size: row.get(2)?,
                        trigger: row.get(3)?,
                        description: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(|e| anyhow::anyhow!("Failed to query backup {id}: {e}"))?;
        drop(conn);
        Ok(row.map(|r| self.to_info(r)))
    }

    /// All logged backups, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let rows = {
            let conn = self.store.lock()?;
            read_logs(&conn)?
        };
        Ok(rows.into_iter().map(|r| self.to_info(r)).collect())
    }

    /// Replace the live database with backup `id`. A safety backup of the
    /// current state is taken first. The backup log itself is kept as it was
    /// before the restore. Returns `None` for an unknown id.
    ///
    /// Old backups are only pruned once the restore is done, and never the
    /// one restored from.
    pub fn restore_backup(&self, id: i64) -> Result<Option<RestoreOutcome>> {
        let Some(target) = self.get_backup(id)? else {
            return Ok(None);
        };
        let source_path = self.config.dir.join(&target.filename);
        // read-only so a missing file is an error rather than a fresh empty db
        let source = Connection::open_with_flags(&source_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| anyhow::anyhow!("Backup file {} is unreadable: {e}", target.filename))?;

        let description = format!("Automatic backup before restoring #{id}");
        let safety_backup = Some(self.write_backup(BackupTrigger::Auto, Some(&description))?);

        {
            let mut conn = self.store.lock()?;
            let logs = read_logs(&conn)?;
            Backup::new(&source, &mut conn)
                .and_then(|backup| {
                    backup.run_to_completion(RESTORE_PAGES_PER_STEP, Duration::ZERO, None)
                })
                .map_err(|e| anyhow::anyhow!("Failed to restore {}: {e}", target.filename))?;

            let tx = conn
                .transaction()
                .map_err(|e| anyhow::anyhow!("Failed to start transaction: {e}"))?;
            tx.execute("DELETE FROM backup_logs", [])
                .map_err(|e| anyhow::anyhow!("Failed to reset backup log: {e}"))?;
            for log in &logs {
                tx.execute(
                    "INSERT INTO backup_logs (id, filename, file_size, trigger, description, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        log.id,
                        log.filename,
                        log.file_size,
                        log.trigger,
                        log.description,
                        log.created_at
                    ],
                )
                .map_err(|e| anyhow::anyhow!("Failed to rewrite backup log: {e}"))?;
            }
            tx.commit()
                .map_err(|e| anyhow::anyhow!("Failed to commit backup log: {e}"))?;
        }
        info!("Restored database from {}", target.filename);

        if let Err(e) = self.prune_backups(Some(id)) {
            warn!("Failed to remove old backups: {e}");
        }

        Ok(Some(RestoreOutcome {
            restored_from: target.filename,
            backup_created_at: target.created_at,
            safety_backup,
        }))
    }

    /// Remove a backup file and its log entry. Returns `false` for an unknown id.
    pub fn delete_backup(&self, id: i64) -> Result<bool> {
        let Some(backup) = self.get_backup(id)? else {
            return Ok(false);
        };
        let path = self.config.dir.join(&backup.filename);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to delete {}: {e}", backup.filename))?;
        }
        let conn = self.store.lock()?;
        conn.execute("DELETE FROM backup_logs WHERE id = ?1", params![id])
            .map_err(|e| anyhow::anyhow!("Failed to delete backup log {id}: {e}"))?;
        debug!("Deleted backup {}", backup.filename);
        Ok(true)
    }

    /// Delete the oldest backups beyond `max_backups`. Returns how many went.
    pub fn cleanup_old_backups(&self) -> Result<usize> {
        self.prune_backups(None)
    }

    /// Like `cleanup_old_backups`, but backup `keep` is never deleted and
    /// counts towards the limit.
    fn prune_backups(&self, keep: Option<i64>) -> Result<usize> {
        let backups = self.list_backups()?;
        let kept = backups.iter().any(|b| Some(b.id) == keep) as usize;
        let excess: Vec<i64> = backups
            .into_iter()
            .filter(|b| Some(b.id) != keep)
            .skip(self.config.max_backups.saturating_sub(kept))
            .map(|b| b.id)
            .collect();
        for id in &excess {
            self.delete_backup(*id)?;
        }
        if !excess.is_empty() {
            info!("Removed {} old backups", excess.len());
        }
        Ok(excess.len())
    }

    pub fn stats(&self) -> Result<BackupStats> {
        let backups = self.list_backups()?;
        let total_size: i64 = backups.iter().map(|b| b.file_size).sum();
        Ok(BackupStats {
            total_backups: backups.len(),
            total_size_mb: round_mb(total_size),
            max_backups: self.config.max_backups,
            last_backup: backups.into_iter().next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use familytree_core::PersonInput;
    use tempfile::TempDir;

    fn setup(temp_dir: &TempDir) -> (FamilyStore, BackupManager) {
        let store = FamilyStore::open(temp_dir.path().join("familytree.db")).unwrap();
        let manager =
            BackupManager::new(store.clone(), BackupConfig::new(temp_dir.path().join("backups")))
                .unwrap();
        (store, manager)
    }

    fn add_person(store: &FamilyStore, first: &str) {
        store
            .create_person(
                PersonInput {
                    first_name: first.to_string(),
                    last_name: "Fekete".to_string(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
    }

    #[test]
    fn test_create_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let (_store, manager) = setup(&temp_dir);

        let first = manager
            .create_backup(BackupTrigger::Manual, Some("first"))
            .unwrap();
        assert!(first.filename.starts_with(BACKUP_PREFIX));
        assert!(first.exists);
        assert!(first.file_size > 0);

        let second = manager.create_backup(BackupTrigger::Manual, None).unwrap();
        assert_ne!(first.filename, second.filename);

        let listed = manager.list_backups().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(manager.stats().unwrap().total_backups, 2);
    }

    #[test]
    fn test_auto_backup_is_throttled() {
        let temp_dir = TempDir::new().unwrap();
        let (_store, manager) = setup(&temp_dir);

        assert!(manager.auto_backup(Some("edit")).unwrap().is_some());
        assert!(manager.auto_backup(Some("edit")).unwrap().is_none());
        assert_eq!(manager.list_backups().unwrap().len(), 1);
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let temp_dir = TempDir::new().unwrap();
        let store = FamilyStore::open(temp_dir.path().join("familytree.db")).unwrap();
        let mut config = BackupConfig::new(temp_dir.path().join("backups"));
        config.max_backups = 2;
        let manager = BackupManager::new(store, config).unwrap();

        let first = manager.create_backup(BackupTrigger::Manual, None).unwrap();
        manager.create_backup(BackupTrigger::Manual, None).unwrap();
        manager.create_backup(BackupTrigger::Manual, None).unwrap();

        let listed = manager.list_backups().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|b| b.id != first.id));
        assert!(!manager.backup_dir().join(&first.filename).exists());
    }

    #[test]
    fn test_restore_rolls_back_data_but_keeps_log() {
        let temp_dir = TempDir::new().unwrap();
        let (store, manager) = setup(&temp_dir);

        add_person(&store, "Before");
        let snapshot = manager.create_backup(BackupTrigger::Manual, None).unwrap();
        add_person(&store, "After");
        assert_eq!(store.list_persons().unwrap().len(), 2);

        let outcome = manager.restore_backup(snapshot.id).unwrap().unwrap();
        assert_eq!(outcome.restored_from, snapshot.filename);
        assert!(outcome.safety_backup.is_some());

        let persons = store.list_persons().unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].first_name, "Before");

        // the snapshot and the safety backup are both still logged
        assert_eq!(manager.list_backups().unwrap().len(), 2);
        assert!(manager.restore_backup(9999).unwrap().is_none());
    }

    #[test]
    fn test_restore_oldest_backup_at_capacity() {
        let temp_dir = TempDir::new().unwrap();
        let store = FamilyStore::open(temp_dir.path().join("familytree.db")).unwrap();
        let mut config = BackupConfig::new(temp_dir.path().join("backups"));
        config.max_backups = 2;
        let manager = BackupManager::new(store.clone(), config).unwrap();

        add_person(&store, "Oldest");
        let oldest = manager.create_backup(BackupTrigger::Manual, None).unwrap();
        add_person(&store, "Newer");
        manager.create_backup(BackupTrigger::Manual, None).unwrap();

        let outcome = manager.restore_backup(oldest.id).unwrap().unwrap();
        assert_eq!(outcome.restored_from, oldest.filename);

        let persons = store.list_persons().unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].first_name, "Oldest");

        // limit still holds and the restored backup survives pruning
        let listed = manager.list_backups().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|b| b.id == oldest.id));
        assert!(manager.backup_dir().join(&oldest.filename).exists());
    }

    #[test]
    fn test_restore_missing_file_keeps_live_data() {
        let temp_dir = TempDir::new().unwrap();
        let (store, manager) = setup(&temp_dir);

        add_person(&store, "Live");
        let backup = manager.create_backup(BackupTrigger::Manual, None).unwrap();
        std::fs::remove_file(manager.backup_dir().join(&backup.filename)).unwrap();

        assert!(manager.restore_backup(backup.id).is_err());
        assert_eq!(store.list_persons().unwrap().len(), 1);
        assert!(!manager.backup_dir().join(&backup.filename).exists());
    }

    #[test]
    fn test_delete_backup() {
        let temp_dir = TempDir::new().unwrap();
        let (_store, manager) = setup(&temp_dir);
        let backup = manager.create_backup(BackupTrigger::Manual, None).unwrap();

        assert!(manager.delete_backup(backup.id).unwrap());
        assert!(!manager.delete_backup(backup.id).unwrap());
        assert!(!manager.backup_dir().join(&backup.filename).exists());
        assert!(manager.stats().unwrap().last_backup.is_none());
    }
}
