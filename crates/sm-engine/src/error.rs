//! The engine's error taxonomy.
//!
//! Every error carries the warehouse's errno and sqlstate so cursors and the
//! wire adapter can report them exactly. Host-engine failures are classified
//! by their error category immediately after each sub-statement.

use thiserror::Error;

/// Engine errors, shaped like the warehouse reports them.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Parse failure or unsupported construct (1003, 42000)
    #[error("SQL compilation error:\n{0}")]
    Compilation(String),

    /// Unqualified reference with no current database (90105, 22000)
    #[error(
        "Cannot perform {command}. This session does not have a current database. Call 'USE DATABASE', or use a qualified name."
    )]
    MissingDatabase { command: String },

    /// Unqualified reference with no current schema (90106, 22000)
    #[error(
        "Cannot perform {command}. This session does not have a current schema. Call 'USE SCHEMA', or use a qualified name."
    )]
    MissingSchema { command: String },

    /// Object not found, mapped from the host catalog error (2003, 42S02)
    #[error("{0}")]
    ObjectNotFound(String),

    /// Stage not found (2003, 02000)
    #[error("SQL compilation error:\nStage '{0}' does not exist or not authorized.")]
    StageNotFound(String),

    /// Object creation conflict (2002, 42710)
    #[error("SQL compilation error:\nObject '{0}' already exists.")]
    AlreadyExists(String),

    /// Parameter or column binding failure (2043, 02000)
    #[error("{0}")]
    Bind(String),

    /// File read failure during COPY INTO (91016, 22000)
    #[error("{0}")]
    CopyIo(String),

    /// Type conversion failure during COPY INTO (100038, 22018)
    #[error("{0}")]
    Conversion(String),

    /// Connection lost (250002, 08003)
    #[error("{0}")]
    ConnectionLost(String),

    /// Source location is not a URL or stage reference (1011, 42601)
    #[error("SQL compilation error:\ninvalid URL prefix found in: '{0}'")]
    InvalidUrl(String),

    /// PARQUET loads need a copy transformation (2019, 0A000)
    #[error(
        "SQL compilation error:\nPARQUET file format can produce one and only one column of type variant, object, or array. Load data into separate columns using the MATCH_BY_COLUMN_NAME copy option or copy with transformation."
    )]
    ParquetLoadRequiresSelect,

    /// CREATE TABLE AS column list does not match the query (2026, 42601)
    #[error("SQL compilation error:\nInvalid column definition list")]
    ColumnDefinitionMismatch,

    /// `$name` with no session variable bound (1003, 42000)
    #[error("Session variable '{0}' does not exist")]
    VariableNotSet(String),

    /// Explicitly-unsupported parameter or feature (1003, 42000)
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Host-engine failure outside the mapped categories (250001, XX000)
    #[error("{0}")]
    Internal(String),
}

/// Result type alias for [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// The warehouse error number.
    pub fn errno(&self) -> u32 {
        match self {
            EngineError::Compilation(_) => 1003,
            EngineError::MissingDatabase { .. } => 90105,
            EngineError::MissingSchema { .. } => 90106,
            EngineError::ObjectNotFound(_) => 2003,
            EngineError::StageNotFound(_) => 2003,
            EngineError::AlreadyExists(_) => 2002,
            EngineError::Bind(_) => 2043,
            EngineError::CopyIo(_) => 91016,
            EngineError::Conversion(_) => 100038,
            EngineError::ConnectionLost(_) => 250002,
            EngineError::InvalidUrl(_) => 1011,
            EngineError::ParquetLoadRequiresSelect => 2019,
            EngineError::ColumnDefinitionMismatch => 2026,
            EngineError::VariableNotSet(_) => 1003,
            EngineError::Unsupported(_) => 1003,
            EngineError::Internal(_) => 250001,
        }
    }

    /// The ANSI sqlstate the warehouse reports.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            EngineError::Compilation(_) => "42000",
            EngineError::MissingDatabase { .. } => "22000",
            EngineError::MissingSchema { .. } => "22000",
            EngineError::ObjectNotFound(_) => "42S02",
            EngineError::StageNotFound(_) => "02000",
            EngineError::AlreadyExists(_) => "42710",
            EngineError::Bind(_) => "02000",
            EngineError::CopyIo(_) => "22000",
            EngineError::Conversion(_) => "22018",
            EngineError::ConnectionLost(_) => "08003",
            EngineError::InvalidUrl(_) => "42601",
            EngineError::ParquetLoadRequiresSelect => "0A000",
            EngineError::ColumnDefinitionMismatch => "42601",
            EngineError::VariableNotSet(_) => "42000",
            EngineError::Unsupported(_) => "42000",
            EngineError::Internal(_) => "XX000",
        }
    }

    /// Connector-style rendering: `002003 (42S02): message`.
    pub fn formatted(&self) -> String {
        format!("{:06} ({}): {self}", self.errno(), self.sqlstate())
    }
}

impl From<sm_sql::SqlError> for EngineError {
    fn from(err: sm_sql::SqlError) -> Self {
        use sm_sql::SqlError;
        match err {
            SqlError::ParseError { message } => EngineError::Compilation(message),
            SqlError::EmptySql => EngineError::Compilation("Empty SQL statement.".to_string()),
            SqlError::Unsupported(what) => EngineError::Unsupported(what),
            SqlError::Compilation(message) => EngineError::Compilation(message),
            SqlError::InvalidUrlPrefix(url) => EngineError::InvalidUrl(url),
            SqlError::ParquetLoadRequiresSelect => EngineError::ParquetLoadRequiresSelect,
            SqlError::MissingDatabase { command } => EngineError::MissingDatabase { command },
            SqlError::MissingSchema { command } => EngineError::MissingSchema { command },
            SqlError::InvalidColumnDefinitionList => EngineError::ColumnDefinitionMismatch,
        }
    }
}

/// Classify a host-engine error into the taxonomy by its error category.
///
/// The message's first line carries the category, e.g.
/// `Catalog Error: Table with name t1 does not exist!`.
pub fn classify_host_error(err: duckdb::Error) -> EngineError {
    let message = err.to_string();
    let first_line = message.lines().next().unwrap_or_default().to_string();

    if message.contains("Catalog Error") {
        EngineError::ObjectNotFound(first_line)
    } else if message.contains("Binder Error") {
        EngineError::Bind(first_line)
    } else if message.contains("Parser Error") || message.contains("Syntax Error") {
        EngineError::Compilation(first_line)
    } else if message.contains("Conversion Error") {
        EngineError::Conversion(first_line)
    } else if message.contains("IO Error") || message.contains("HTTP Error") {
        EngineError::CopyIo(first_line)
    } else if message.contains("Connection Error") {
        EngineError::ConnectionLost(first_line)
    } else {
        EngineError::Internal(message)
    }
}

/// True when the host refused a COMMIT/ROLLBACK because no transaction is
/// active — the warehouse treats both as successful no-ops.
pub fn is_no_active_transaction(err: &duckdb::Error) -> bool {
    let message = err.to_string();
    message.contains("no transaction is active")
}
