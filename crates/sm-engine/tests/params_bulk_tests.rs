//! Parameter binding styles, dict results, the result cache, and the bulk
//! loader.

use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType as ArrowType, Field, Schema};
use arrow::record_batch::RecordBatch;

use sm_engine::{bulk, Connection, Instance, InstanceOptions, ParamStyle, Value};

fn connect_with(paramstyle: ParamStyle) -> (Instance, Connection) {
    let instance = Instance::new(InstanceOptions {
        paramstyle,
        ..InstanceOptions::new()
    })
    .unwrap();
    let conn = instance.connect(Some("db1"), Some("schema1")).unwrap();
    (instance, conn)
}

#[test]
fn test_pyformat_params() {
    let (_i, conn) = connect_with(ParamStyle::Pyformat);
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT, b VARCHAR)").unwrap();
    cur.execute_with_params(
        "INSERT INTO t VALUES (%s, %s)",
        &[Value::Int(1), Value::Str("o'k".to_string())],
    )
    .unwrap();
    cur.execute("SELECT a, b FROM t").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Int(1), Value::Str("o'k".to_string())]]
    );
}

#[test]
fn test_qmark_params() {
    let (_i, conn) = connect_with(ParamStyle::Qmark);
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT, b VARCHAR)").unwrap();
    cur.execute_with_params(
        "INSERT INTO t VALUES (?, ?)",
        &[Value::Int(7), Value::Str("x".to_string())],
    )
    .unwrap();
    cur.execute("SELECT a, b FROM t").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Int(7), Value::Str("x".to_string())]]
    );
}

#[test]
fn test_qmark_create_stage_identifier() {
    let (_i, conn) = connect_with(ParamStyle::Qmark);
    let mut cur = conn.cursor();
    cur.execute_with_params(
        "CREATE STAGE identifier(?)",
        &[Value::Str("\"stage1\"".to_string())],
    )
    .unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![vec![Value::Str("Stage area stage1 successfully created.".to_string())]]
    );
}

#[test]
fn test_executemany() {
    let (_i, conn) = connect_with(ParamStyle::Pyformat);
    let mut cur = conn.cursor();
    cur.execute("CREATE TABLE t (a INT)").unwrap();
    cur.executemany(
        "INSERT INTO t VALUES (%s)",
        &[vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]],
    )
    .unwrap();
    cur.execute("SELECT count(*) FROM t").unwrap();
    assert_eq!(cur.fetchall().unwrap(), vec![vec![Value::Int(3)]]);
}

#[test]
fn test_fetchall_maps() {
    let (_i, conn) = connect_with(ParamStyle::Pyformat);
    let mut cur = conn.cursor();
    cur.execute("SELECT 1 AS a, 'x' AS b").unwrap();
    let maps = cur.fetchall_maps().unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0]["A"], Value::Int(1));
    assert_eq!(maps[0]["B"], Value::Str("x".to_string()));
}

#[test]
fn test_result_cache_by_statement_id() {
    let (_i, conn) = connect_with(ParamStyle::Pyformat);
    let mut cur = conn.cursor();
    cur.execute("SELECT 42 AS n").unwrap();
    let sfqid = cur.sfqid().unwrap().to_string();

    let cached = conn.cached_result(&sfqid).expect("result cached");
    assert_eq!(cached.iter().map(|b| b.num_rows()).sum::<usize>(), 1);
    assert!(conn.cached_result("unknown-id").is_none());
}

#[test]
fn test_bulk_write_batches_auto_create() {
    let (_i, conn) = connect_with(ParamStyle::Pyformat);

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", ArrowType::Int64, true),
        Field::new("name", ArrowType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from_iter_values([1, 2])),
            Arc::new(StringArray::from_iter_values(["a", "b"])),
        ],
    )
    .unwrap();

    let written = bulk::write_batches(&conn, "loaded", &[batch], true).unwrap();
    assert_eq!(written, 2);

    let mut cur = conn.cursor();
    cur.execute("SELECT id, name FROM loaded ORDER BY id").unwrap();
    assert_eq!(
        cur.fetchall().unwrap(),
        vec![
            vec![Value::Int(1), Value::Str("a".to_string())],
            vec![Value::Int(2), Value::Str("b".to_string())],
        ]
    );
}
