//! Error types for sm-sql

use thiserror::Error;

/// SQL parsing and translation errors.
///
/// Carries enough shape for the engine to map each case onto the wire
/// error taxonomy (errno + sqlstate).
#[derive(Error, Debug)]
pub enum SqlError {
    /// SQL parse error
    #[error("SQL compilation error:\n{message}")]
    ParseError { message: String },

    /// Empty SQL
    #[error("SQL is empty")]
    EmptySql,

    /// Statement or argument shape the translator does not support
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Compilation error with a warehouse-shaped message
    #[error("SQL compilation error:\n{0}")]
    Compilation(String),

    /// Source location is not a URL or stage reference
    #[error("SQL compilation error:\ninvalid URL prefix found in: {0}")]
    InvalidUrlPrefix(String),

    /// PARQUET loads require a copy transformation subquery
    #[error(
        "SQL compilation error:\nPARQUET file format can produce one and only one column of type variant, object, or array. Load data into separate columns using the MATCH_BY_COLUMN_NAME copy option or copy with transformation."
    )]
    ParquetLoadRequiresSelect,

    /// Unqualified reference with no current database
    #[error(
        "Cannot perform {command}. This session does not have a current database. Call 'USE DATABASE', or use a qualified name."
    )]
    MissingDatabase { command: String },

    /// Unqualified reference with no current schema
    #[error(
        "Cannot perform {command}. This session does not have a current schema. Call 'USE SCHEMA', or use a qualified name."
    )]
    MissingSchema { command: String },

    /// Invalid column definition list in CREATE TABLE AS
    #[error("SQL compilation error:\nInvalid column definition list")]
    InvalidColumnDefinitionList,
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;
