//! Bulk loading of record batches.
//!
//! Appends Arrow batches into a table through the host's appender, creating
//! the table from the batch schema when asked to.

use arrow::datatypes::{DataType as ArrowType, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;

use crate::error::{classify_host_error, EngineError, EngineResult};
use crate::session::Connection;

fn sql_type(data_type: &ArrowType) -> EngineResult<String> {
    Ok(match data_type {
        ArrowType::Boolean => "BOOLEAN".to_string(),
        ArrowType::Int8 | ArrowType::Int16 | ArrowType::Int32 | ArrowType::Int64 => {
            "BIGINT".to_string()
        }
        ArrowType::UInt8 | ArrowType::UInt16 | ArrowType::UInt32 | ArrowType::UInt64 => {
            "UBIGINT".to_string()
        }
        ArrowType::Float32 | ArrowType::Float64 => "DOUBLE".to_string(),
        ArrowType::Utf8 | ArrowType::LargeUtf8 => "VARCHAR".to_string(),
        ArrowType::Binary | ArrowType::LargeBinary => "BLOB".to_string(),
        ArrowType::Date32 | ArrowType::Date64 => "DATE".to_string(),
        ArrowType::Time64(_) => "TIME".to_string(),
        ArrowType::Timestamp(TimeUnit::Microsecond, None) => "TIMESTAMP".to_string(),
        ArrowType::Timestamp(_, Some(_)) => "TIMESTAMPTZ".to_string(),
        ArrowType::Timestamp(_, None) => "TIMESTAMP".to_string(),
        ArrowType::Decimal128(precision, scale) => format!("DECIMAL({precision}, {scale})"),
        other => {
            return Err(EngineError::Unsupported(format!(
                "bulk load for arrow type {other}"
            )))
        }
    })
}

fn create_table_sql(table: &str, schema: &Schema) -> EngineResult<String> {
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| {
            sql_type(field.data_type()).map(|t| {
                format!("\"{}\" {t}", field.name().replace('"', "\"\"").to_uppercase())
            })
        })
        .collect::<EngineResult<_>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {table} ({})",
        columns.join(", ")
    ))
}

/// Append `batches` into `table` on this session, creating the table from
/// the Arrow schema when `auto_create` is set. Returns rows written.
pub fn write_batches(
    conn: &Connection,
    table: &str,
    batches: &[RecordBatch],
    auto_create: bool,
) -> EngineResult<usize> {
    let Some(first) = batches.first() else {
        return Ok(0);
    };

    let state = conn.state.lock().unwrap();
    if auto_create {
        let ddl = create_table_sql(table, first.schema().as_ref())?;
        log::debug!("host: {ddl}");
        state.duck.execute_batch(&ddl).map_err(classify_host_error)?;
    }

    let mut appender = state.duck.appender(table).map_err(classify_host_error)?;
    let mut written = 0;
    for batch in batches {
        appender
            .append_record_batch(batch.clone())
            .map_err(classify_host_error)?;
        written += batch.num_rows();
    }
    appender.flush().map_err(classify_host_error)?;
    Ok(written)
}
