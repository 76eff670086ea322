use rusqlite::Connection;
use scm_core::db::migrations::latest_version;
use scm_core::db::{open_db, open_db_in_memory, DbError};
use scm_core::{CollectionKind, Contact, RecordStore, SqliteRecordStore};

const TABLES: &[&str] = &[
    "tenant_collections",
    "contacts",
    "contact_events",
    "tenant_tags",
    "tenant_labels",
];

#[test]
fn in_memory_database_is_fully_migrated() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in TABLES {
        assert_table_exists(&conn, table);
    }
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn reopening_a_file_keeps_schema_and_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.sqlite3");

    let conn = open_db(&path).unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store.provision_tenant("acme").unwrap();
    let mut contact = Contact::new("acme", "Acme");
    contact.id = "acme-1".to_string();
    store
        .save_contact("acme", CollectionKind::Active, &contact)
        .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    assert!(store
        .get_contact("acme", CollectionKind::Active, "acme-1")
        .unwrap()
        .is_some());
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::SchemaTooNew { found, supported } => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_step_rolls_back_and_names_the_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("half.sqlite3");

    // A pre-existing `contacts` table makes step 1 fail midway.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE contacts (id TEXT);").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::Migration { version, name, .. } => {
            assert_eq!(version, 1);
            assert_eq!(name, "contacts");
        }
        other => panic!("unexpected error: {other}"),
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
}

#[test]
fn stores_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(SqliteRecordStore::try_new(&conn).is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
