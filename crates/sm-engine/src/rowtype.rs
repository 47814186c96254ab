//! Result-metadata mapping.
//!
//! Maps host-engine column types (as DESCRIBE reports them) to the
//! warehouse's type codes and precision/scale/length fields.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{EngineError, EngineResult};

/// Warehouse-shaped column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Warehouse logical type name, lower case (`fixed`, `text`, ...)
    pub sf_type: String,
    pub type_code: i32,
    pub display_size: Option<i32>,
    pub internal_size: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub is_nullable: bool,
}

/// Precision and scale of a rendered DECIMAL type.
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+),\s*(\d+)\)").expect("valid regex literal"));

/// Map one `(column_name, column_type)` pair from a host DESCRIBE.
pub fn column_info(name: &str, column_type: &str) -> EngineResult<ColumnInfo> {
    let upper = column_type.to_uppercase();

    let mut info = ColumnInfo {
        name: name.to_string(),
        sf_type: String::new(),
        type_code: 0,
        display_size: None,
        internal_size: None,
        precision: None,
        scale: None,
        is_nullable: true,
    };

    if upper.starts_with("DECIMAL") {
        info.sf_type = "fixed".to_string();
        info.type_code = 0;
        let (precision, scale) = DECIMAL_RE
            .captures(&upper)
            .map(|c| (c[1].parse().ok(), c[2].parse().ok()))
            .unwrap_or((Some(38), Some(0)));
        info.precision = precision;
        info.scale = scale;
        return Ok(info);
    }

    match upper.as_str() {
        "BIGINT" | "INTEGER" | "SMALLINT" | "TINYINT" | "HUGEINT" | "UBIGINT" | "UINTEGER" => {
            info.sf_type = "fixed".to_string();
            info.type_code = 0;
            info.precision = Some(38);
            info.scale = Some(0);
        }
        "DOUBLE" | "FLOAT" | "REAL" => {
            info.sf_type = "real".to_string();
            info.type_code = 1;
        }
        "VARCHAR" => {
            info.sf_type = "text".to_string();
            info.type_code = 2;
            info.internal_size = Some(16_777_216);
        }
        "DATE" => {
            info.sf_type = "date".to_string();
            info.type_code = 3;
        }
        "JSON" => {
            info.sf_type = "variant".to_string();
            info.type_code = 5;
        }
        "TIMESTAMP WITH TIME ZONE" => {
            info.sf_type = "timestamp_tz".to_string();
            info.type_code = 7;
            info.precision = Some(0);
            info.scale = Some(9);
        }
        "TIMESTAMP" | "TIMESTAMP_NS" => {
            info.sf_type = "timestamp_ntz".to_string();
            info.type_code = 8;
            info.precision = Some(0);
            info.scale = Some(9);
        }
        "BLOB" => {
            info.sf_type = "binary".to_string();
            info.type_code = 11;
            info.internal_size = Some(8_388_608);
        }
        "TIME" => {
            info.sf_type = "time".to_string();
            info.type_code = 12;
            info.precision = Some(0);
            info.scale = Some(9);
        }
        "BOOLEAN" => {
            info.sf_type = "boolean".to_string();
            info.type_code = 13;
        }
        other => {
            return Err(EngineError::Unsupported(format!(
                "result metadata for column type {other}"
            )))
        }
    }
    Ok(info)
}

/// Map the full output of a host DESCRIBE.
pub fn describe_as_rowtype(rows: &[(String, String)]) -> EngineResult<Vec<ColumnInfo>> {
    rows.iter()
        .map(|(name, column_type)| column_info(name, column_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bigint_is_fixed_38_0() {
        let info = column_info("X", "BIGINT").unwrap();
        assert_eq!(info.type_code, 0);
        assert_eq!(info.precision, Some(38));
        assert_eq!(info.scale, Some(0));
    }

    #[test]
    fn test_decimal_precision_scale() {
        let info = column_info("X", "DECIMAL(10,2)").unwrap();
        assert_eq!(info.type_code, 0);
        assert_eq!(info.precision, Some(10));
        assert_eq!(info.scale, Some(2));
    }

    #[test]
    fn test_varchar_internal_size() {
        let info = column_info("S", "VARCHAR").unwrap();
        assert_eq!(info.type_code, 2);
        assert_eq!(info.internal_size, Some(16_777_216));
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(column_info("T", "TIMESTAMP").unwrap().type_code, 8);
        assert_eq!(
            column_info("T", "TIMESTAMP WITH TIME ZONE").unwrap().type_code,
            7
        );
    }

    #[test]
    fn test_json_is_variant() {
        let info = column_info("V", "JSON").unwrap();
        assert_eq!(info.type_code, 5);
        assert_eq!(info.sf_type, "variant");
    }

    #[test]
    fn test_unknown_type_errors() {
        assert!(column_info("X", "INTERVAL").is_err());
    }
}
