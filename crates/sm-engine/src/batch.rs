//! Columnar result handling.
//!
//! Cursors keep their result as Arrow record batches; rows are materialised
//! lazily for the fetch API, and the wire adapter serialises batches to IPC
//! with the warehouse's per-field metadata.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array, Float64Array,
    Int16Array, Int32Array, Int64Array, Int8Array, LargeBinaryArray, LargeStringArray,
    StringArray, Time64MicrosecondArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray, UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType as ArrowType, Schema, TimeUnit};
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;

use crate::error::{EngineError, EngineResult};
use crate::rowtype::ColumnInfo;
use crate::value::Value;

/// Maximum rows per wire batch.
pub const MAX_BATCH_ROWS: usize = 1000;

/// Total rows across batches.
pub fn row_count(batches: &[RecordBatch]) -> usize {
    batches.iter().map(|b| b.num_rows()).sum()
}

/// Extract up to `count` rows starting at global row `start`.
pub fn rows(batches: &[RecordBatch], start: usize, count: usize) -> EngineResult<Vec<Vec<Value>>> {
    let mut out = Vec::new();
    let mut skip = start;

    for batch in batches {
        if out.len() >= count {
            break;
        }
        if skip >= batch.num_rows() {
            skip -= batch.num_rows();
            continue;
        }
        let take = (batch.num_rows() - skip).min(count - out.len());
        for row in skip..skip + take {
            let mut cells = Vec::with_capacity(batch.num_columns());
            for column in batch.columns() {
                cells.push(cell(column.as_ref(), row)?);
            }
            out.push(cells);
        }
        skip = 0;
    }
    Ok(out)
}

fn cell(array: &dyn Array, row: usize) -> EngineResult<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    macro_rules! get {
        ($t:ty) => {
            array.as_any().downcast_ref::<$t>().unwrap().value(row)
        };
    }

    Ok(match array.data_type() {
        ArrowType::Boolean => Value::Bool(get!(BooleanArray)),
        ArrowType::Int8 => Value::Int(get!(Int8Array) as i64),
        ArrowType::Int16 => Value::Int(get!(Int16Array) as i64),
        ArrowType::Int32 => Value::Int(get!(Int32Array) as i64),
        ArrowType::Int64 => Value::Int(get!(Int64Array)),
        ArrowType::UInt32 => Value::Int(get!(UInt32Array) as i64),
        ArrowType::UInt64 => Value::Int(get!(UInt64Array) as i64),
        ArrowType::Float32 => Value::Float(get!(Float32Array) as f64),
        ArrowType::Float64 => Value::Float(get!(Float64Array)),
        ArrowType::Utf8 => Value::Str(get!(StringArray).to_string()),
        ArrowType::LargeUtf8 => Value::Str(get!(LargeStringArray).to_string()),
        ArrowType::Binary => Value::Bytes(get!(BinaryArray).to_vec()),
        ArrowType::LargeBinary => Value::Bytes(get!(LargeBinaryArray).to_vec()),
        ArrowType::Date32 => Value::Date(get!(Date32Array)),
        ArrowType::Time64(TimeUnit::Microsecond) => Value::Time(get!(Time64MicrosecondArray)),
        ArrowType::Timestamp(unit, tz) => {
            let micros = match unit {
                TimeUnit::Second => get!(TimestampSecondArray) * 1_000_000,
                TimeUnit::Millisecond => get!(TimestampMillisecondArray) * 1_000,
                TimeUnit::Microsecond => get!(TimestampMicrosecondArray),
                TimeUnit::Nanosecond => get!(TimestampNanosecondArray) / 1_000,
            };
            if tz.is_some() {
                Value::TimestampTz(micros)
            } else {
                Value::Timestamp(micros)
            }
        }
        ArrowType::Decimal128(_, scale) => {
            Value::Decimal(get!(Decimal128Array), *scale as u32)
        }
        other => {
            return Err(EngineError::Unsupported(format!(
                "fetch for arrow type {other}"
            )))
        }
    })
}

/// Re-slice batches so none exceeds [`MAX_BATCH_ROWS`] rows.
pub fn rebatch(batches: &[RecordBatch]) -> Vec<RecordBatch> {
    let mut out = Vec::new();
    for batch in batches {
        let mut offset = 0;
        while offset < batch.num_rows() {
            let len = (batch.num_rows() - offset).min(MAX_BATCH_ROWS);
            out.push(batch.slice(offset, len));
            offset += len;
        }
        if batch.num_rows() == 0 {
            out.push(batch.clone());
        }
    }
    out
}

/// Attach the warehouse's per-field metadata expected by its drivers.
fn schema_with_metadata(schema: &Schema, rowtype: &[ColumnInfo]) -> EngineResult<Arc<Schema>> {
    if schema.fields().len() != rowtype.len() {
        return Err(EngineError::Internal(format!(
            "schema and rowtype must be the same length: {} != {}",
            schema.fields().len(),
            rowtype.len()
        )));
    }

    let fields: Vec<_> = schema
        .fields()
        .iter()
        .zip(rowtype)
        .map(|(field, info)| {
            let metadata = HashMap::from([
                ("logicalType".to_string(), info.sf_type.to_uppercase()),
                (
                    "precision".to_string(),
                    info.precision.unwrap_or(38).to_string(),
                ),
                ("scale".to_string(), info.scale.unwrap_or(0).to_string()),
                (
                    "charLength".to_string(),
                    info.internal_size.unwrap_or(0).to_string(),
                ),
            ]);
            field.as_ref().clone().with_metadata(metadata)
        })
        .collect();

    Ok(Arc::new(Schema::new(fields)))
}

/// Serialise batches to an Arrow IPC stream, one record batch per
/// [`MAX_BATCH_ROWS`] rows.
pub fn to_ipc(batches: &[RecordBatch], rowtype: &[ColumnInfo]) -> EngineResult<Vec<u8>> {
    let Some(first) = batches.first() else {
        return Ok(Vec::new());
    };
    let schema = schema_with_metadata(first.schema().as_ref(), rowtype)?;

    let mut sink = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut sink, schema.as_ref())
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        for batch in rebatch(batches) {
            let batch = RecordBatch::try_new(schema.clone(), batch.columns().to_vec())
                .map_err(|e| EngineError::Internal(e.to_string()))?;
            writer
                .write(&batch)
                .map_err(|e| EngineError::Internal(e.to_string()))?;
        }
        writer
            .finish()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
    }
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::Field;

    fn batch(n: usize) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", ArrowType::Int64, true),
            Field::new("name", ArrowType::Utf8, true),
        ]));
        let ids = Int64Array::from_iter_values(0..n as i64);
        let names = StringArray::from_iter_values((0..n).map(|i| format!("row{i}")));
        RecordBatch::try_new(schema, vec![Arc::new(ids), Arc::new(names)]).unwrap()
    }

    #[test]
    fn test_rows_extraction() {
        let b = batch(3);
        let rows = rows(&[b], 1, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Value::Int(1), Value::Str("row1".to_string())]);
    }

    #[test]
    fn test_rebatch_limits_rows() {
        let b = batch(2500);
        let parts = rebatch(&[b]);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].num_rows(), 1000);
        assert_eq!(parts[2].num_rows(), 500);
    }

    #[test]
    fn test_to_ipc_roundtrip_metadata() {
        let b = batch(2);
        let rowtype = vec![
            ColumnInfo {
                name: "id".to_string(),
                sf_type: "fixed".to_string(),
                type_code: 0,
                display_size: None,
                internal_size: None,
                precision: Some(38),
                scale: Some(0),
                is_nullable: true,
            },
            ColumnInfo {
                name: "name".to_string(),
                sf_type: "text".to_string(),
                type_code: 2,
                display_size: None,
                internal_size: Some(16_777_216),
                precision: None,
                scale: None,
                is_nullable: true,
            },
        ];
        let bytes = to_ipc(&[b], &rowtype).unwrap();
        assert!(!bytes.is_empty());

        let reader =
            arrow::ipc::reader::StreamReader::try_new(std::io::Cursor::new(bytes), None).unwrap();
        let schema = reader.schema();
        assert_eq!(schema.field(0).metadata()["logicalType"], "FIXED");
        assert_eq!(schema.field(1).metadata()["charLength"], "16777216");
    }
}
