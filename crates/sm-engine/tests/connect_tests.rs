//! Session lifecycle and database/schema behaviour.

use sm_engine::{Instance, InstanceOptions, Value};

fn instance() -> Instance {
    Instance::open().unwrap()
}

#[test]
fn test_select_one_without_database() {
    let instance = instance();
    let conn = instance.connect(None, None).unwrap();
    let mut cur = conn.cursor();
    cur.execute("SELECT 1").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(1)]]);
}

#[test]
fn test_create_table_without_database_fails_90105() {
    let instance = instance();
    let conn = instance.connect(None, None).unwrap();
    let mut cur = conn.cursor();
    let err = cur.execute("CREATE TABLE t (x INT)").unwrap_err();
    assert_eq!(err.errno(), 90105);
    assert_eq!(err.sqlstate(), "22000");
    assert!(err.to_string().contains("CREATE TABLE"), "{err}");
    assert_eq!(cur.sqlstate(), Some("22000"));
}

#[test]
fn test_create_table_without_schema_fails_90106() {
    let instance = instance();
    let conn = instance.connect(Some("db1"), None).unwrap();
    let mut cur = conn.cursor();
    let err = cur.execute("CREATE TABLE t (x INT)").unwrap_err();
    assert_eq!(err.errno(), 90106);
}

#[test]
fn test_connect_creates_database_and_schema() {
    let instance = instance();
    let conn = instance.connect(Some("db1"), Some("schema1")).unwrap();
    assert_eq!(conn.database().as_deref(), Some("DB1"));
    assert_eq!(conn.schema().as_deref(), Some("SCHEMA1"));

    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (x INT)").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Table T successfully created.".to_string())]]
    );
}

#[test]
fn test_create_use_database_current_schema() {
    // spec scenario: three statements, three distinct statement ids
    let instance = instance();
    let conn = instance.connect(None, None).unwrap();

    let mut cur = conn.cursor();
    cur.execute("CREATE DATABASE DB1").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Database DB1 successfully created.".to_string())]]
    );
    let id1 = cur.sfqid().unwrap().to_string();

    cur.execute("USE DATABASE DB1").unwrap();
    let id2 = cur.sfqid().unwrap().to_string();

    cur.execute("SELECT CURRENT_SCHEMA()").unwrap();
    let id3 = cur.sfqid().unwrap().to_string();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("MAIN".to_string())]]
    );

    assert!(!id1.is_empty() && !id2.is_empty() && !id3.is_empty());
    assert_ne!(id1, id2);
    assert_ne!(id2, id3);
    assert_ne!(id1, id3);
}

#[test]
fn test_use_schema_and_create_objects() {
    let instance = instance();
    let conn = instance.connect(None, None).unwrap();
    let mut cur = conn.cursor();

    cur.execute("CREATE DATABASE DB1").unwrap();
    cur.execute("USE DATABASE DB1").unwrap();
    cur.execute("CREATE SCHEMA SCHEMA1").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Schema SCHEMA1 successfully created.".to_string())]]
    );
    cur.execute("USE SCHEMA SCHEMA1").unwrap();
    cur.execute("CREATE TABLE t1 (x INT)").unwrap();
    cur.execute("DESCRIBE TABLE t1").unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Str("X".to_string()));
}

#[test]
fn test_use_missing_database_fails() {
    let instance = instance();
    let conn = instance.connect(None, None).unwrap();
    let mut cur = conn.cursor();
    let err = cur.execute("USE DATABASE missing").unwrap_err();
    assert_eq!(err.errno(), 2003);
}

#[test]
fn test_sessions_are_isolated() {
    let instance = instance();
    let conn1 = instance.connect(Some("db1"), Some("schema1")).unwrap();
    let conn2 = instance.connect(Some("db2"), Some("schema2")).unwrap();

    conn1.execute("CREATE TABLE t1 (x INT)").unwrap();
    conn1.execute("INSERT INTO t1 VALUES (1)").unwrap();

    // unqualified resolution stays per-session
    let mut cur2 = conn2.cursor();
    assert!(cur2.execute("SELECT * FROM t1").is_err());

    // but qualified access crosses databases
    let mut cur2 = conn2.cursor();
    cur2.execute("SELECT x FROM db1.schema1.t1").unwrap();
    assert_eq!(cur2.fetchall().unwrap(), vec![vec![Value::Int(1)]]);
}

#[test]
fn test_drop_database_resets_session() {
    let instance = instance();
    let conn = instance.connect(Some("db1"), Some("schema1")).unwrap();
    let mut cur = conn.cursor();
    cur.execute("DROP DATABASE db1").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("DB1 successfully dropped.".to_string())]]
    );
    assert_eq!(conn.database(), None);
}

#[test]
fn test_execute_string_ignores_comments() {
    let instance = instance();
    let conn = instance.connect(Some("db1"), Some("schema1")).unwrap();
    let cursors = conn
        .execute_string(
            "CREATE TABLE t1 (x INT);\n-- a comment\n;INSERT INTO t1 VALUES (1), (2);",
        )
        .unwrap();
    assert_eq!(cursors.len(), 2);
    assert_eq!(cursors.last().unwrap().rowcount(), Some(2));
}

#[test]
fn test_nop_regexes() {
    let instance = Instance::new(InstanceOptions {
        nop_regexes: vec!["^GRANT ".to_string()],
        ..InstanceOptions::new()
    })
    .unwrap();
    let conn = instance.connect(Some("db1"), Some("schema1")).unwrap();
    let mut cur = conn.cursor();
    cur.execute("GRANT SELECT ON t1 TO ROLE analyst").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Statement executed successfully.".to_string())]]
    );
}

#[test]
fn test_closed_connection_rejects_statements() {
    let instance = instance();
    let conn = instance.connect(Some("db1"), Some("schema1")).unwrap();
    conn.close();
    assert!(conn.is_closed());
    let mut cur = conn.cursor();
    let err = cur.execute("SELECT 1").unwrap_err();
    assert_eq!(err.errno(), 250002);
}

#[test]
fn test_connect_information_schema() {
    // the reserved name substitutes on write and reverses on read
    let instance = instance();
    let conn = instance.connect(Some("db1"), Some("information_schema")).unwrap();
    assert_eq!(conn.schema().as_deref(), Some("INFORMATION_SCHEMA"));
    let mut cur = conn.cursor();
    cur.execute("SELECT 1").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(1)]]);
}
