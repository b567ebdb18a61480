use catalog_core::db::migrations::latest_version;
use catalog_core::db::{open_db, open_db_in_memory, DbError};
use catalog_core::{RepoError, SqliteCatalogRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "genres",
        "languages",
        "authors",
        "books",
        "book_genres",
        "users",
        "book_instances",
        "user_profiles",
    ] {
        assert_table_exists(&conn, table);
    }
    assert!(table_columns(&conn, "books").contains(&"pages".to_string()));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute("INSERT INTO genres (name) VALUES ('Poetry');", [])
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let genres: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM genres;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(genres, 1);
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
    let err = SqliteCatalogRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn schema_rejects_unknown_status_and_negative_pages() {
    let conn = open_db_in_memory().unwrap();

    let bad_status = conn.execute(
        "INSERT INTO book_instances (id, imprint, status) VALUES ('x', 'imprint', 'z');",
        [],
    );
    assert!(bad_status.is_err());

    let negative_pages = conn.execute(
        "INSERT INTO books (title, isbn, pages) VALUES ('t', '1', -1);",
        [],
    );
    assert!(negative_pages.is_err());

    conn.execute(
        "INSERT INTO book_instances (id, imprint) VALUES ('y', 'imprint');",
        [],
    )
    .unwrap();
    let status: String = conn
        .query_row("SELECT status FROM book_instances WHERE id = 'y';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(status, "m");
}

#[test]
fn language_names_are_unique_ignoring_case_at_schema_level() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO languages (name) VALUES ('English');", [])
        .unwrap();
    let duplicate = conn.execute("INSERT INTO languages (name) VALUES ('english');", []);
    assert!(duplicate.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});")).unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut columns = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        columns.push(row.get(1).unwrap());
    }
    columns
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
