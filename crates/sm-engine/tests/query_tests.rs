//! Query execution: type coercions, result metadata, semi-structured
//! handling, variables, and function shims.

use sm_engine::{Connection, Instance, Value};

fn connect() -> (Instance, Connection) {
    let instance = Instance::open().unwrap();
    let conn = instance.connect(Some("db1"), Some("schema1")).unwrap();
    (instance, conn)
}

#[test]
fn test_insert_select_and_description() {
    // spec scenario: INT surfaces as NUMBER(38,0) backed by BIGINT
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (x INT)").unwrap();
    cur.execute("INSERT INTO t VALUES (1), (2)").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(2)]]);
    assert_eq!(cur.column_names(), vec!["number of rows inserted"]);
    assert_eq!(cur.rowcount(), Some(2));

    cur.execute("SELECT x FROM t ORDER BY x").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Int(1)], vec![Value::Int(2)]]
    );
    let description = cur.description().unwrap();
    assert_eq!(description[0].name, "X");
    assert_eq!(description[0].type_code, 0);
    assert_eq!(description[0].precision, Some(38));
    assert_eq!(description[0].scale, Some(0));
}

#[test]
fn test_update_delete_statuses() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (x INT)").unwrap();
    cur.execute("INSERT INTO t VALUES (1), (2), (3)").unwrap();

    cur.execute("UPDATE t SET x = x + 10 WHERE x > 1").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Int(2), Value::Int(0)]]
    );
    assert_eq!(
        cur.column_names(),
        vec!["number of rows updated", "number of multi-joined rows updated"]
    );

    cur.execute("DELETE FROM t WHERE x = 1").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(1)]]);
    assert_eq!(cur.column_names(), vec!["number of rows deleted"]);
}

#[test]
fn test_parse_json_path_to_varchar() {
    // spec scenario: extracted value cast to VARCHAR comes back unquoted
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT PARSE_JSON('{\"fruit\":\"banana\"}'):fruit::VARCHAR")
        .unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("banana".to_string())]]
    );
}

#[test]
fn test_try_parse_json_invalid_is_null() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT TRY_PARSE_JSON('{invalid: ,]')").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Null]]);
}

#[test]
fn test_array_size() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT ARRAY_SIZE(PARSE_JSON('[1,2,3]'))").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(3)]]);

    cur.execute("SELECT ARRAY_SIZE(PARSE_JSON('null'))").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Null]]);
}

#[test]
fn test_split_surfaces_json_array() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT SPLIT('a,b', ',')").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("[\"a\",\"b\"]".to_string())]]
    );
}

#[test]
fn test_object_construct_elides_nulls() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT OBJECT_CONSTRUCT('a', 1, 'b', NULL)::VARCHAR")
        .unwrap();
    let rows = cur.fetchall().unwrap();
    match &rows[0][0] {
        Value::Str(s) => {
            assert!(s.contains("\"a\""), "{s}");
            assert!(!s.contains("\"b\""), "{s}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_semi_structured_column_types() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (v VARIANT, o OBJECT, a ARRAY)").unwrap();
    cur.execute("INSERT INTO t VALUES ('1', '{\"k\":2}', '[3]')").unwrap();
    cur.execute("SELECT a[0] FROM t").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Str("3".to_string())]]);

    cur.execute("SELECT o['k'] FROM t").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Str("2".to_string())]]);
}

#[test]
fn test_flatten_table_function() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT VALUE FROM TABLE(FLATTEN(PARSE_JSON('[10, 20]')))")
        .unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![
            vec![Value::Str("10".to_string())],
            vec![Value::Str("20".to_string())]
        ]
    );
}

#[test]
fn test_flatten_object_keys() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute(
        "SELECT KEY, VALUE::VARCHAR FROM TABLE(FLATTEN(PARSE_JSON('{\"a\": 1}')))",
    )
    .unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Str("a".to_string()));
    assert_eq!(rows[0][1], Value::Str("1".to_string()));
}

#[test]
fn test_session_variables() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SET who = 'world'").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Statement executed successfully.".to_string())]]
    );
    cur.execute("SELECT $who").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("world".to_string())]]
    );
    cur.execute("UNSET who").unwrap();
    let err = cur.execute("SELECT $who").unwrap_err();
    assert!(err.to_string().contains("does not exist"), "{err}");
}

#[test]
fn test_values_column_names() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT * FROM (VALUES (1, 'a'), (2, 'b'))").unwrap();
    assert_eq!(cur.column_names(), vec!["COLUMN1", "COLUMN2"]);
}

#[test]
fn test_sequences() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE SEQUENCE seq1").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Sequence SEQ1 successfully created.".to_string())]]
    );
    cur.execute("SELECT seq1.nextval").unwrap();
    assert_eq!(cur.column_names(), vec!["NEXTVAL"]);
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(1)]]);
    cur.execute("SELECT seq1.nextval").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(2)]]);
}

#[test]
fn test_autoincrement_split() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (id INT AUTOINCREMENT, name VARCHAR)").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Table T successfully created.".to_string())]]
    );
    cur.execute("INSERT INTO t (name) VALUES ('a')").unwrap();
    cur.execute("INSERT INTO t (name) VALUES ('b')").unwrap();
    cur.execute("SELECT id, name FROM t ORDER BY id").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![
            vec![Value::Int(1), Value::Str("a".to_string())],
            vec![Value::Int(2), Value::Str("b".to_string())]
        ]
    );
}

#[test]
fn test_sha2_functions() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT SHA2('snow')").unwrap();
    match &cur.fetchall().unwrap()[0][0] {
        Value::Str(s) => assert_eq!(s.len(), 64),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_random_is_bigint_range() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT RANDOM()").unwrap();
    assert!(matches!(cur.fetchall().unwrap()[0][0], Value::Int(_)));
}

#[test]
fn test_text_lengths_in_describe() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a VARCHAR(20), b VARCHAR, n NUMBER(10,2))").unwrap();
    cur.execute("DESCRIBE TABLE t").unwrap();
    let rows = cur.fetchall().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][1], Value::Str("VARCHAR(20)".to_string()));
    assert_eq!(rows[1][1], Value::Str("VARCHAR(16777216)".to_string()));
    assert_eq!(rows[2][1], Value::Str("NUMBER(10,2)".to_string()));
}

#[test]
fn test_table_comment_roundtrip() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (x INT) COMMENT = 'our table'").unwrap();
    cur.execute("SELECT comment FROM information_schema.tables WHERE table_name = 'T'")
        .unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("our table".to_string())]]
    );

    cur.execute("COMMENT ON TABLE t IS 'revised'").unwrap();
    cur.execute("SELECT comment FROM information_schema.tables WHERE table_name = 'T'")
        .unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("revised".to_string())]]
    );
}

#[test]
fn test_alter_table_add_multiple_columns() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (x INT)").unwrap();
    cur.execute("ALTER TABLE t ADD COLUMN c1 INT, c2 VARCHAR(5)").unwrap();
    cur.execute("SELECT x, c1, c2 FROM t").unwrap();
    assert_eq!(cur.column_names(), vec!["X", "C1", "C2"]);
}

#[test]
fn test_alter_table_cluster_by_is_nop() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (x INT)").unwrap();
    cur.execute("ALTER TABLE t CLUSTER BY (x)").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Statement executed successfully.".to_string())]]
    );
}

#[test]
fn test_create_table_as_with_column_list() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE src (a INT, b VARCHAR)").unwrap();
    cur.execute("INSERT INTO src VALUES (1, 'x')").unwrap();
    cur.execute("CREATE TABLE dst (n NUMBER(10,2), s VARCHAR) AS SELECT * FROM src")
        .unwrap();
    cur.execute("SELECT n, s FROM dst").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Decimal(100, 2), Value::Str("x".to_string())]]
    );
}

#[test]
fn test_ctas_column_count_mismatch() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE src (a INT, b VARCHAR)").unwrap();
    let err = cur
        .execute("CREATE TABLE dst (only_one INT) AS SELECT * FROM src")
        .unwrap_err();
    assert_eq!(err.errno(), 2026);
}

#[test]
fn test_equal_null_macro() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT EQUAL_NULL(NULL, NULL), EQUAL_NULL(1, 2)").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Bool(true), Value::Bool(false)]]
    );
}

#[test]
fn test_fetch_interfaces() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT * FROM (VALUES (1), (2), (3))").unwrap();
    assert_eq!(cur.fetchone().unwrap(), Some(vec![Value::Int(1)]));
    assert_eq!(
        cur.fetchmany(Some(2)).unwrap(),
        vec![vec![Value::Int(2)], vec![Value::Int(3)]]
    );
    assert_eq!(cur.fetchone().unwrap(), None);
}

#[test]
fn test_result_batches_and_ipc() {
    let (_i, conn) = connect();
    let mut cur = conn.cursor();
    cur.execute("SELECT range AS n FROM range(2500)").unwrap();
    let batches = cur.get_result_batches().unwrap();
    assert!(batches.iter().all(|b| b.num_rows() <= 1000));
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2500);

    let ipc = cur.result_ipc().unwrap();
    assert!(!ipc.is_empty());
}
