use rusqlite::Connection;
use taskflow_core::db::migrations::{latest_version, pending_steps};
use taskflow_core::db::{open_db, open_db_in_memory, DbError};
use taskflow_core::store::{Collection, KeyValueStore, SqliteKeyValueStore, SqliteRecordStore};
use taskflow_core::StoreError;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "records");
    assert_table_exists(&conn, "kv_store");
}

#[test]
fn reopening_file_database_keeps_schema_and_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskflow.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    SqliteKeyValueStore::try_new(&conn_first)
        .unwrap()
        .set(Collection::Lists.storage_key(), "[]")
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let kv = SqliteKeyValueStore::try_new(&conn_second).unwrap();
    assert_eq!(
        kv.get(Collection::Lists.storage_key()).unwrap().as_deref(),
        Some("[]")
    );
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::SchemaTooNew { found, supported } => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_schema_step_names_the_step_and_keeps_prior_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clash.db");

    // An index already owns the name the kv_store step wants for its table.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE scratch (x INTEGER);
         CREATE INDEX kv_store ON scratch (x);
         PRAGMA user_version = 1;",
    )
    .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match &err {
        DbError::Migration { version, name, .. } => {
            assert_eq!(*version, 2);
            assert_eq!(*name, "kv_store");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.schema_version(), Some(2));
    assert!(err.to_string().contains("(kv_store)"));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 1);
}

#[test]
fn pending_steps_follow_the_stored_version() {
    let names: Vec<&str> = pending_steps(0).map(|step| step.name).collect();
    assert_eq!(names, vec!["records", "kv_store"]);
    assert_eq!(pending_steps(1).count(), 1);
    assert_eq!(pending_steps(latest_version()).count(), 0);
}

#[test]
fn stores_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    assert!(matches!(
        SqliteRecordStore::try_new(&conn),
        Err(StoreError::MissingRequiredTable("records"))
    ));
    assert!(matches!(
        SqliteKeyValueStore::try_new(&conn),
        Err(StoreError::MissingRequiredTable("kv_store"))
    ));
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
