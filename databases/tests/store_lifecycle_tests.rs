//! Store Lifecycle Tests
//!
//! Exercises a file-backed store the way the service uses it:
//! - records survive reopening the database file
//! - trash round trip across a reopen
//! - backup, further edits, restore

use chrono::Utc;
use familytree_core::{EventInput, FamilyInput, PersonInput};
use familytree_databases::{BackupConfig, BackupManager, BackupTrigger, EntityKind, FamilyStore};
use tempfile::TempDir;

fn person(store: &FamilyStore, first: &str, parent_family: Option<i64>) -> i64 {
    store
        .create_person(
            PersonInput {
                first_name: first.to_string(),
                last_name: "Balogh".to_string(),
                parent_family_id: parent_family,
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
        .id
}

#[test]
fn test_records_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("familytree.db");

    let (kid, family_id) = {
        let store = FamilyStore::open(&db_path).unwrap();
        let a = person(&store, "István", None);
        let b = person(&store, "Katalin", None);
        let family = store
            .create_family(
                FamilyInput {
                    person1_id: Some(a),
                    person2_id: Some(b),
                    start_date: Some("1948-09-12".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        let kid = person(&store, "Ferenc", Some(family.id));
        store
            .create_event(EventInput {
                person_id: Some(kid),
                event_type: Some("baptism".to_string()),
                event_date: Some("1950-02-01".to_string()),
                ..Default::default()
            })
            .unwrap();
        (kid, family.id)
    };

    let store = FamilyStore::open(&db_path).unwrap();
    let graph = store.load_graph().unwrap();
    assert_eq!(graph.persons().count(), 3);
    assert_eq!(graph.parents(kid).len(), 2);
    assert_eq!(graph.family_children(family_id), &[kid]);
    assert_eq!(store.list_events(Some(kid)).unwrap().len(), 1);
}

#[test]
fn test_trash_round_trip_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("familytree.db");

    let id = {
        let store = FamilyStore::open(&db_path).unwrap();
        let id = person(&store, "Mária", None);
        store.soft_delete(EntityKind::Person, id, Utc::now()).unwrap();
        id
    };

    let store = FamilyStore::open(&db_path).unwrap();
    assert!(store.get_person(id).unwrap().is_none());
    let trash = store.list_trash().unwrap();
    assert_eq!(trash.len(), 1);
    assert_eq!(trash[0].entity_id, id);

    store.restore_deleted(EntityKind::Person, id).unwrap();
    assert!(store.get_person(id).unwrap().is_some());
}

#[test]
fn test_backup_then_restore() {
    let temp_dir = TempDir::new().unwrap();
    let store = FamilyStore::open(temp_dir.path().join("familytree.db")).unwrap();
    let manager = BackupManager::new(
        store.clone(),
        BackupConfig::new(temp_dir.path().join("backups")),
    )
    .unwrap();

    let keep = person(&store, "Marad", None);
    let backup = manager
        .create_backup(BackupTrigger::Manual, Some("before cleanup"))
        .unwrap();
    store.soft_delete(EntityKind::Person, keep, Utc::now()).unwrap();
    store.purge(EntityKind::Person, keep).unwrap();
    assert!(store.list_persons().unwrap().is_empty());

    manager.restore_backup(backup.id).unwrap().unwrap();
    assert_eq!(store.list_persons().unwrap().len(), 1);

    let stats = manager.stats().unwrap();
    assert_eq!(stats.total_backups, 2);
    assert_eq!(stats.max_backups, 100);
}
