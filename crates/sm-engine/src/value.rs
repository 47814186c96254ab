//! Engine cell and parameter values.
//!
//! One enum serves both directions: parameters bound into statements and
//! cells fetched out of result batches.

use crate::error::{EngineError, EngineResult};

/// A single cell or parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Fixed-point value with its scale
    Decimal(i128, u32),
    Str(String),
    Bytes(Vec<u8>),
    /// Days since the epoch
    Date(i32),
    /// Microseconds since midnight
    Time(i64),
    /// Microseconds since the epoch, no time zone
    Timestamp(i64),
    /// Microseconds since the epoch, UTC
    TimestampTz(i64),
}

impl Value {
    /// Render as a SQL literal for client-side (pyformat) binding.
    pub fn sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(v, scale) => format_decimal(*v, *scale),
            Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => format!("'{}'::BLOB", hex(b)),
            Value::Date(days) => format!("'{}'::DATE", date_string(*days)),
            Value::Time(micros) => format!("'{}'::TIME", time_string(*micros)),
            Value::Timestamp(micros) => {
                format!("'{}'::TIMESTAMP", timestamp_string(*micros))
            }
            Value::TimestampTz(micros) => {
                format!("'{}+00:00'::TIMESTAMPTZ", timestamp_string(*micros))
            }
        }
    }

    /// Convert to a host parameter for qmark binding.
    pub fn to_duckdb(&self) -> EngineResult<duckdb::types::Value> {
        use duckdb::types::Value as Dv;
        Ok(match self {
            Value::Null => Dv::Null,
            Value::Bool(b) => Dv::Boolean(*b),
            Value::Int(i) => Dv::BigInt(*i),
            Value::Float(f) => Dv::Double(*f),
            Value::Str(s) => Dv::Text(s.clone()),
            Value::Bytes(b) => Dv::Blob(b.clone()),
            other => {
                return Err(EngineError::Bind(format!(
                    "cannot bind parameter {other:?}"
                )))
            }
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v, scale) => write!(f, "{}", format_decimal(*v, *scale)),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "{}", hex(b)),
            Value::Date(days) => write!(f, "{}", date_string(*days)),
            Value::Time(micros) => write!(f, "{}", time_string(*micros)),
            Value::Timestamp(micros) => write!(f, "{}", timestamp_string(*micros)),
            Value::TimestampTz(micros) => write!(f, "{}+00:00", timestamp_string(*micros)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn format_decimal(value: i128, scale: u32) -> String {
    if scale == 0 {
        return value.to_string();
    }
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let scale = scale as usize;
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    format!("{}{int_part}.{frac_part}", if negative { "-" } else { "" })
}

fn date_string(days: i32) -> String {
    chrono::DateTime::from_timestamp(days as i64 * 86_400, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| days.to_string())
}

fn time_string(micros: i64) -> String {
    let seconds = micros / 1_000_000;
    let sub = micros % 1_000_000;
    let (h, m, s) = (seconds / 3600, (seconds / 60) % 60, seconds % 60);
    if sub == 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{h:02}:{m:02}:{s:02}.{sub:06}")
    }
}

fn timestamp_string(micros: i64) -> String {
    let secs = micros.div_euclid(1_000_000);
    let sub = micros.rem_euclid(1_000_000) as u32;
    chrono::DateTime::from_timestamp(secs, sub * 1000)
        .map(|dt| {
            if sub == 0 {
                dt.format("%Y-%m-%d %H:%M:%S").to_string()
            } else {
                dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
            }
        })
        .unwrap_or_else(|| micros.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_literal_escaping() {
        assert_eq!(Value::Str("o'clock".to_string()).sql_literal(), "'o''clock'");
        assert_eq!(Value::Null.sql_literal(), "NULL");
        assert_eq!(Value::Int(42).sql_literal(), "42");
    }

    #[test]
    fn test_decimal_display() {
        assert_eq!(Value::Decimal(12345, 2).to_string(), "123.45");
        assert_eq!(Value::Decimal(-5, 2).to_string(), "-0.05");
        assert_eq!(Value::Decimal(7, 0).to_string(), "7");
    }

    #[test]
    fn test_date_display() {
        assert_eq!(Value::Date(0).to_string(), "1970-01-01");
        assert_eq!(Value::Date(19723).to_string(), "2024-01-01");
    }

    #[test]
    fn test_timestamp_display() {
        assert_eq!(Value::Timestamp(0).to_string(), "1970-01-01 00:00:00");
    }
}
