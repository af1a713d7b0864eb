use rubrica_core::db::{open_db, open_db_in_memory};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_creates_the_contact_schema() {
    let conn = open_db_in_memory().unwrap();

    assert_table_exists(&conn, "sessions");
    assert_table_exists(&conn, "contacts");
}

#[test]
fn reopening_a_database_file_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rubrica.db");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO contacts (owner, phone, first_name, last_name, address, age)
         VALUES ('mario', '+391', 'Anna', 'Bianchi', 'Via Po', 30);",
        [],
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM contacts;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn contacts_reject_negative_age_and_duplicate_phone_per_owner() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO contacts (owner, phone, first_name, last_name, address, age)
                  VALUES (?1, ?2, 'A', 'B', 'C', ?3);";

    assert!(conn.execute(insert, rusqlite::params!["mario", "+391", -1]).is_err());
    conn.execute(insert, rusqlite::params!["mario", "+391", 1]).unwrap();
    assert!(conn.execute(insert, rusqlite::params!["mario", "+391", 2]).is_err());
    conn.execute(insert, rusqlite::params!["anna", "+391", 2]).unwrap();
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
