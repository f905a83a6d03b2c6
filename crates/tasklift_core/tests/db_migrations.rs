use rusqlite::Connection;
use tasklift_core::db::migrations::latest_version;
use tasklift_core::db::{open_db, open_db_in_memory, DbError};
use tasklift_core::repo::task_repo::SqliteTaskRepository;
use tasklift_core::StoreError;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "namespaces",
        "lists",
        "tasks",
        "task_reminders",
        "labels",
        "task_labels",
        "task_relations",
        "task_attachments",
        "migration_status",
    ] {
        assert_table_exists(&conn, table);
    }

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasklift.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "migration_status");
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
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteTaskRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        StoreError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn relation_table_rejects_self_edges() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO namespaces (uuid, owner_uuid, title) VALUES ('n', 'u', 'N');
         INSERT INTO lists (uuid, namespace_uuid, title) VALUES ('l', 'n', 'L');
         INSERT INTO tasks (uuid, list_uuid, title) VALUES ('t', 'l', 'T');",
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO task_relations (task_uuid, other_task_uuid, relation_kind)
         VALUES ('t', 't', 'related');",
        [],
    );
    assert!(result.is_err());
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
