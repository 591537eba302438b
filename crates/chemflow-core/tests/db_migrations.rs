use chemflow::db::migrations::{current_user_version, latest_version};
use chemflow::db::{DbError, open_db, open_db_in_memory};

fn assert_table_exists(conn: &rusqlite::Connection, table: &str) {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table],
            |row| row.get(0),
        )
        .unwrap();
    assert!(exists, "expected table `{table}` to exist");
}

fn assert_column_exists(conn: &rusqlite::Connection, table: &str, column: &str) {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});")).unwrap();
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(
        columns.iter().any(|c| c == column),
        "expected column `{table}.{column}`, found {columns:?}"
    );
}

#[test]
fn in_memory_database_has_the_full_schema() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    for table in [
        "systems",
        "system_properties",
        "atoms",
        "calculators",
        "calculator_attributes",
        "templates",
        "jobs",
        "vibration_sets",
        "vibrations",
    ] {
        assert_table_exists(&conn, table);
    }
    for column in ["enthalpy", "internal_energy", "total_magnetization", "articledoi"] {
        assert_column_exists(&conn, "systems", column);
    }
    assert_column_exists(&conn, "jobs", "jobscript");
}

#[test]
fn reopening_a_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chemflow.db");
    drop(open_db(&path).unwrap());
    let conn = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
}

#[test]
fn newer_schema_versions_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    }
    match open_db(&path) {
        Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("expected an unsupported schema error, got {other:?}"),
    }
}

#[test]
fn version_one_databases_are_upgraded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
            .unwrap();
        conn.execute_batch("PRAGMA user_version = 1;").unwrap();
        conn.execute("INSERT INTO systems (name) VALUES ('legacy');", [])
            .unwrap();
    }
    let conn = open_db(&path).unwrap();
    assert_column_exists(&conn, "systems", "magnetic_moment");
    let name: String = conn
        .query_row("SELECT name FROM systems WHERE id = 1;", [], |r| r.get(0))
        .unwrap();
    assert_eq!(name, "legacy");
}
