//! Credential store round trips.

use asksql::config::{ConnectionProfile, Secret};
use asksql::db::DatabaseKind;
use asksql::persistence::{CredentialStore, PersonalStore, SharedStore};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn postgres_profile() -> ConnectionProfile {
    ConnectionProfile {
        kind: Some(DatabaseKind::Postgres),
        host: Some("localhost".to_string()),
        port: Some(5432),
        user: Some("analyst".to_string()),
        password: Some(Secret::new("quote'n\"back\\slash")),
        database: Some("shop".to_string()),
        schema: Some("public".to_string()),
    }
}

fn stores(dir: &std::path::Path) -> Vec<Box<dyn CredentialStore>> {
    vec![
        Box::new(PersonalStore::with_path(dir.join("personal.json"))),
        Box::new(SharedStore::in_dir(dir.join(".config"))),
    ]
}

#[test]
fn test_save_load_round_trip_recovers_password() {
    let dir = tempdir().unwrap();

    for store in stores(dir.path()) {
        assert!(!store.exists());
        assert_eq!(store.load(), None);

        store.save(&postgres_profile()).unwrap();

        assert!(store.exists());
        let loaded = store.load().unwrap();
        assert_eq!(loaded, postgres_profile());
        assert_eq!(
            loaded.password.unwrap().expose(),
            "quote'n\"back\\slash"
        );
    }
}

#[test]
fn test_stores_are_independent() {
    let dir = tempdir().unwrap();
    let personal = PersonalStore::with_path(dir.path().join("personal.json"));
    let shared = SharedStore::in_dir(dir.path().join(".config"));

    personal.save(&postgres_profile()).unwrap();

    assert!(personal.exists());
    assert!(!shared.exists());
}

#[test]
fn test_save_replaces_previous_profile() {
    let dir = tempdir().unwrap();

    for store in stores(dir.path()) {
        store.save(&postgres_profile()).unwrap();

        let mysql = ConnectionProfile {
            kind: Some(DatabaseKind::MySql),
            host: Some("mysql.local".to_string()),
            ..ConnectionProfile::default()
        };
        store.save(&mysql).unwrap();

        assert_eq!(store.load(), Some(mysql));
    }
}

#[test]
fn test_incomplete_profile_is_saved_unvalidated() {
    let dir = tempdir().unwrap();
    let partial = ConnectionProfile {
        host: Some("only-a-host".to_string()),
        ..ConnectionProfile::default()
    };

    for store in stores(dir.path()) {
        store.save(&partial).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, partial);
        assert!(loaded.validate().is_err());
    }
}

#[test]
fn test_clear_then_load_is_absent() {
    let dir = tempdir().unwrap();

    for store in stores(dir.path()) {
        store.save(&postgres_profile()).unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
        assert_eq!(store.load(), None);
    }
}
