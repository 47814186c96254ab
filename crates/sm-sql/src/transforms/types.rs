//! Data-type coercions and text-length capture.
//!
//! Types are matched on their rendered form and rebuilt through
//! `parse_data_type`, keeping the transforms independent of the parser's
//! `DataType` payload details across dialect spellings (NUMBER, FLOAT4,
//! TIMESTAMP_NTZ(9), ...).

use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, DataType, Expr, Statement,
};

use super::walk::rewrite_exprs;
use super::{TableRef, Tags, TransformContext};
use crate::error::SqlResult;
use crate::parser::parse_data_type;

/// Maximum VARCHAR length the warehouse reports when none is declared.
pub const MAX_TEXT_LENGTH: i64 = 16_777_216;

/// Compute the host type a target type maps to, if it differs.
///
/// FLOAT family → DOUBLE (Snowflake floats are 64-bit), fixed-point integers
/// and NUMBER(38,0) → BIGINT, semi-structured → JSON, TIMESTAMP_NTZ →
/// microsecond TIMESTAMP, TIMESTAMP_TZ/LTZ → TIMESTAMP WITH TIME ZONE.
fn coerced(data_type: &DataType) -> Option<&'static str> {
    let compact = data_type.to_string().to_uppercase().replace(' ', "");
    let target = match compact.as_str() {
        "FLOAT" | "FLOAT4" | "FLOAT8" | "REAL" => "DOUBLE",
        "INT" | "INTEGER" | "SMALLINT" | "TINYINT" | "BYTEINT" => "BIGINT",
        "NUMBER" | "DECIMAL" | "NUMERIC" | "NUMBER(38,0)" | "DECIMAL(38,0)" | "NUMERIC(38,0)" => {
            "BIGINT"
        }
        "OBJECT" | "VARIANT" | "ARRAY" => "JSON",
        _ if compact.starts_with("TIMESTAMP_NTZ") || compact.starts_with("TIMESTAMPNTZ") => {
            "TIMESTAMP"
        }
        _ if compact.starts_with("TIMESTAMP_TZ")
            || compact.starts_with("TIMESTAMPTZ")
            || compact.starts_with("TIMESTAMP_LTZ")
            || compact.starts_with("TIMESTAMPLTZ") =>
        {
            "TIMESTAMP WITH TIME ZONE"
        }
        _ if compact.starts_with("NUMBER(") => return Some("DECIMAL"),
        _ => return None,
    };
    Some(target)
}

fn coerce_data_type(data_type: &mut DataType) -> SqlResult<()> {
    match coerced(data_type) {
        Some("DECIMAL") => {
            // NUMBER(p,s) → DECIMAL(p,s), parameters preserved
            let rendered = data_type.to_string().to_uppercase().replace(' ', "");
            let params = rendered.trim_start_matches("NUMBER");
            *data_type = parse_data_type(&format!("DECIMAL{params}"))?;
        }
        Some(target) => *data_type = parse_data_type(target)?,
        None => {}
    }
    Ok(())
}

fn coerce_column_def(column: &mut ColumnDef) -> SqlResult<()> {
    coerce_data_type(&mut column.data_type)?;
    // the host has no column comments; lengths are captured separately
    column
        .options
        .retain(|opt| !matches!(opt.option, ColumnOption::Comment(_)));
    Ok(())
}

/// Coerce declared and cast types throughout the statement.
pub fn coerce_types(
    statement: &mut Statement,
    _ctx: &TransformContext,
    _tags: &mut Tags,
) -> SqlResult<()> {
    match statement {
        Statement::CreateTable(create) => {
            for column in &mut create.columns {
                coerce_column_def(column)?;
            }
        }
        Statement::AlterTable { operations, .. } => {
            for op in operations {
                if let AlterTableOperation::AddColumn { column_def, .. } = op {
                    coerce_column_def(column_def)?;
                }
            }
        }
        _ => {}
    }

    rewrite_exprs(statement, |expr| {
        if let Expr::Cast { data_type, .. } = expr {
            coerce_data_type(data_type)?;
        }
        Ok(())
    })
}

fn text_length_of(data_type: &DataType) -> Option<i64> {
    let compact = data_type.to_string().to_uppercase().replace(' ', "");
    for prefix in ["VARCHAR", "TEXT", "STRING", "CHAR"] {
        if let Some(rest) = compact.strip_prefix(prefix) {
            if rest.is_empty() {
                return Some(MAX_TEXT_LENGTH);
            }
            if let Some(size) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
                return size.parse().ok();
            }
        }
    }
    None
}

/// Capture declared VARCHAR sizes so the catalog can report them; the host
/// engine does not store fixed text lengths.
pub fn extract_text_length(
    statement: &mut Statement,
    _ctx: &TransformContext,
    tags: &mut Tags,
) -> SqlResult<()> {
    let mut lengths: Vec<(String, i64)> = Vec::new();
    let table;

    match statement {
        Statement::CreateTable(create) => {
            table = Some(TableRef::from_object_name(&create.name));
            for column in &create.columns {
                if let Some(size) = text_length_of(&column.data_type) {
                    lengths.push((column.name.value.clone(), size));
                }
            }
        }
        Statement::AlterTable {
            name, operations, ..
        } => {
            table = Some(TableRef::from_object_name(name));
            for op in operations.iter() {
                if let AlterTableOperation::AddColumn { column_def, .. } = op {
                    if let Some(size) = text_length_of(&column_def.data_type) {
                        lengths.push((column_def.name.value.clone(), size));
                    }
                }
            }
        }
        _ => return Ok(()),
    }

    if !lengths.is_empty() {
        tags.text_lengths = lengths;
        tags.text_lengths_table = table;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::transforms::tests::transform_one;

    #[test]
    fn test_int_to_bigint() {
        let host = transform_one("CREATE TABLE T1 (X INT)");
        assert_eq!(host.sql, "CREATE TABLE T1 (X BIGINT)");
    }

    #[test]
    fn test_number_38_0_to_bigint() {
        let host = transform_one("CREATE TABLE T1 (X NUMBER(38,0))");
        assert_eq!(host.sql, "CREATE TABLE T1 (X BIGINT)");
    }

    #[test]
    fn test_number_precision_kept() {
        let host = transform_one("CREATE TABLE T1 (X NUMBER(10,2))");
        assert!(host.sql.contains("DECIMAL(10,2)") || host.sql.contains("DECIMAL(10, 2)"), "{}", host.sql);
    }

    #[test]
    fn test_float_to_double() {
        let host = transform_one("CREATE TABLE T1 (X FLOAT)");
        assert_eq!(host.sql, "CREATE TABLE T1 (X DOUBLE)");
    }

    #[test]
    fn test_semi_structured_types() {
        let host = transform_one("CREATE TABLE T1 (A OBJECT, B ARRAY, C VARIANT)");
        assert_eq!(host.sql, "CREATE TABLE T1 (A JSON, B JSON, C JSON)");
    }

    #[test]
    fn test_timestamp_ntz() {
        let host = transform_one("CREATE TABLE T1 (T TIMESTAMP_NTZ)");
        assert_eq!(host.sql, "CREATE TABLE T1 (T TIMESTAMP)");
    }

    #[test]
    fn test_cast_coerced() {
        let host = transform_one("SELECT X::VARIANT FROM T1");
        assert_eq!(host.sql, "SELECT X::JSON FROM T1");
    }

    #[test]
    fn test_text_lengths_captured() {
        let host = transform_one("CREATE TABLE T1 (A VARCHAR(20), B VARCHAR, C INT)");
        assert_eq!(
            host.tags.text_lengths,
            vec![("A".to_string(), 20), ("B".to_string(), 16_777_216)]
        );
        assert_eq!(host.tags.text_lengths_table.as_ref().unwrap().name, "T1");
    }
}
