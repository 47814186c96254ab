//! Stages, PUT/LIST, and COPY INTO.

use std::io::Write;

use sm_engine::{Connection, Instance, Value};

fn connect() -> (Instance, Connection) {
    let instance = Instance::open().unwrap();
    let conn = instance.connect(Some("db1"), Some("schema1")).unwrap();
    (instance, conn)
}

fn as_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn test_create_stage_and_show_stages() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();

    cur.execute("CREATE STAGE stage1").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Stage area STAGE1 successfully created.".to_string())]]
    );

    cur.execute("CREATE TEMP STAGE stage2 URL='s3://bucket/path/'").unwrap();

    let err = cur.execute("CREATE STAGE stage1").unwrap_err();
    assert_eq!(err.errno(), 2002);
    assert_eq!(err.sqlstate(), "42710");
    assert_eq!(
        err.formatted(),
        "002002 (42710): SQL compilation error:\nObject 'STAGE1' already exists."
    );

    // IF NOT EXISTS succeeds quietly
    cur.execute("CREATE STAGE IF NOT EXISTS stage1").unwrap();

    cur.execute("SHOW STAGES").unwrap();
    let names = cur.column_names();
    assert_eq!(names[0], "created_on");
    assert_eq!(names[1], "name");
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(as_str(&rows[0][1]), "STAGE1");
    assert_eq!(as_str(&rows[1][1]), "STAGE2");
    // type / cloud reflect the URL
    assert_eq!(as_str(&rows[0][10]), "INTERNAL");
    assert_eq!(rows[0][11], Value::Null);
    assert_eq!(as_str(&rows[1][10]), "EXTERNAL TEMPORARY");
    assert_eq!(as_str(&rows[1][11]), "AWS");
}

#[test]
fn test_drop_stage() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE STAGE stage1").unwrap();
    cur.execute("DROP STAGE stage1").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("STAGE1 successfully dropped.".to_string())]]
    );
    let err = cur.execute("DROP STAGE stage1").unwrap_err();
    assert_eq!(err.errno(), 2003);
    assert_eq!(err.sqlstate(), "02000");
}

#[test]
fn test_put_then_list() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE STAGE st").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foo.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"1,2\n").unwrap();
    drop(file);

    cur.execute(&format!("PUT 'file://{}' @st", path.display())).unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_str(&rows[0][0]), "foo.csv");
    assert_eq!(as_str(&rows[0][1]), "foo.csv.gz");
    assert_eq!(rows[0][2], Value::Int(4));
    assert_eq!(as_str(&rows[0][4]), "NONE");
    assert_eq!(as_str(&rows[0][5]), "GZIP");
    assert_eq!(as_str(&rows[0][6]), "UPLOADED");

    cur.execute("LIST @st").unwrap();
    assert_eq!(
        cur.column_names(),
        vec!["name", "size", "md5", "last_modified"]
    );
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_str(&rows[0][0]), "st/foo.csv.gz");
    match rows[0][1] {
        Value::Int(size) => assert!(size > 0),
        ref other => panic!("unexpected size {other:?}"),
    }
    // md5 is a 32-char hex digest
    assert_eq!(as_str(&rows[0][2]).len(), 32);
    // RFC 7231 format, e.g. "Sat, 31 May 2025 08:50:51 GMT"
    let last_modified = as_str(&rows[0][3]);
    assert!(last_modified.ends_with("GMT"), "{last_modified}");
}

#[test]
fn test_list_missing_stage() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    let err = cur.execute("LIST @nope").unwrap_err();
    assert_eq!(err.errno(), 2003);
    assert_eq!(err.sqlstate(), "02000");
    assert!(
        err.to_string()
            .contains("Stage 'DB1.SCHEMA1.NOPE' does not exist or not authorized"),
        "{err}"
    );
}

#[test]
fn test_get_downloads_files() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE STAGE st").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(&path, "x\n").unwrap();
    cur.execute(&format!("PUT 'file://{}' @st", path.display())).unwrap();

    let target = tempfile::tempdir().unwrap();
    cur.execute(&format!("GET @st 'file://{}'", target.path().display()))
        .unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_str(&rows[0][0]), "data.csv.gz");
    assert!(target.path().join("data.csv.gz").is_file());
}

fn write_csv(dir: &std::path::Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_copy_into_from_local_directory() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT, b VARCHAR)").unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "one.csv", "1,x\n2,y\n");

    cur.execute(&format!("COPY INTO t FROM '{}/'", dir.path().display()))
        .unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_str(&rows[0][1]), "LOADED");
    assert_eq!(rows[0][2], Value::Int(2));
    assert_eq!(rows[0][3], Value::Int(2));
    assert_eq!(
        cur.column_names(),
        vec![
            "file",
            "status",
            "rows_parsed",
            "rows_loaded",
            "error_limit",
            "errors_seen",
            "first_error",
            "first_error_line",
            "first_error_character",
            "first_error_column_name"
        ]
    );

    cur.execute("SELECT a, b FROM t ORDER BY a").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![
            vec![Value::Int(1), Value::Str("x".to_string())],
            vec![Value::Int(2), Value::Str("y".to_string())],
        ]
    );
}

#[test]
fn test_copy_into_skips_previously_loaded() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT)").unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "nums.csv", "1\n2\n3\n");
    let source = format!("COPY INTO t FROM '{}/'", dir.path().display());

    cur.execute(&source).unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(as_str(&rows[0][1]), "LOADED");

    // without FORCE each file loads at most once
    cur.execute(&source).unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(as_str(&rows[0][1]), "LOAD_SKIPPED");
    assert_eq!(as_str(&rows[0][6]), "File was loaded before.");

    cur.execute("SELECT count(*) FROM t").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(3)]]);

    // FORCE reloads
    cur.execute(&format!("{source} FORCE = TRUE")).unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(as_str(&rows[0][1]), "LOADED");
    cur.execute("SELECT count(*) FROM t").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(6)]]);
}

#[test]
fn test_copy_into_load_history() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT)").unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "h.csv", "7\n");
    cur.execute(&format!("COPY INTO t FROM '{}/'", dir.path().display()))
        .unwrap();

    cur.execute(
        "SELECT table_name, status, row_count FROM information_schema.load_history",
    )
    .unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_str(&rows[0][0]), "T");
    assert_eq!(as_str(&rows[0][1]), "LOADED");
    assert_eq!(rows[0][2], Value::Int(1));
}

#[test]
fn test_copy_into_from_stage() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT, b VARCHAR)").unwrap();
    cur.execute("CREATE STAGE st").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.csv");
    std::fs::write(&path, "5,z\n").unwrap();
    cur.execute(&format!("PUT 'file://{}' @st", path.display())).unwrap();

    cur.execute("COPY INTO t FROM @st").unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 1);
    // internal stage files report as <stage>/<basename>
    assert_eq!(as_str(&rows[0][0]), "st/rows.csv.gz");
    assert_eq!(as_str(&rows[0][1]), "LOADED");

    cur.execute("SELECT a, b FROM t").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Int(5), Value::Str("z".to_string())]]
    );
}

#[test]
fn test_copy_into_missing_stage() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT)").unwrap();
    let err = cur.execute("COPY INTO t FROM @missing").unwrap_err();
    assert_eq!(err.errno(), 2003);
    assert_eq!(err.sqlstate(), "02000");
}

#[test]
fn test_copy_into_empty_source() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT)").unwrap();

    let dir = tempfile::tempdir().unwrap();
    cur.execute(&format!("COPY INTO t FROM '{}/'", dir.path().display()))
        .unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Copy executed with 0 files processed.".to_string())]]
    );
}

#[test]
fn test_copy_into_with_skip_header_and_delimiter() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT, b VARCHAR)").unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "d.csv", "a|b\n1|x\n");
    cur.execute(&format!(
        "COPY INTO t FROM '{}/' FILE_FORMAT = (TYPE = CSV SKIP_HEADER = 1 FIELD_DELIMITER = '|')",
        dir.path().display()
    ))
    .unwrap();

    cur.execute("SELECT a, b FROM t").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Int(1), Value::Str("x".to_string())]]
    );
}
