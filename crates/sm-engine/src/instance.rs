//! Process-level engine instance.
//!
//! Owns the root host connection the global database is attached to.
//! Construction is the process-wide initialisation point; sessions are
//! cloned connections so default-schema changes never leak across sessions.

use std::path::PathBuf;

use crate::catalog;
use crate::error::{classify_host_error, EngineResult};
use crate::session::Connection;

/// Client-side parameter binding style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `%s` / `%(name)s`, substituted client-side
    #[default]
    Pyformat,
    /// Same substitution as pyformat
    Format,
    /// `?` placeholders passed through to the host
    Qmark,
}

/// Instance configuration.
#[derive(Debug, Clone, Default)]
pub struct InstanceOptions {
    /// Directory for persistent database files; in-memory when absent
    pub db_path: Option<PathBuf>,
    /// Statements matching any of these patterns short-circuit to success
    pub nop_regexes: Vec<String>,
    pub paramstyle: ParamStyle,
    /// Create the connection's database on connect when missing
    pub create_database: bool,
    /// Create the connection's schema on connect when missing
    pub create_schema: bool,
}

impl InstanceOptions {
    pub fn new() -> Self {
        InstanceOptions {
            db_path: None,
            nop_regexes: Vec::new(),
            paramstyle: ParamStyle::default(),
            create_database: true,
            create_schema: true,
        }
    }
}

/// An in-process warehouse emulator instance.
pub struct Instance {
    root: duckdb::Connection,
    options: InstanceOptions,
}

impl Instance {
    /// Open the host engine and attach the global database.
    pub fn new(options: InstanceOptions) -> EngineResult<Self> {
        let root = duckdb::Connection::open_in_memory().map_err(classify_host_error)?;
        root.execute_batch(&catalog::global_creation_sql())
            .map_err(classify_host_error)?;
        log::debug!("attached global database {}", catalog::GLOBAL_DATABASE);
        Ok(Instance { root, options })
    }

    /// Open an instance with default options.
    pub fn open() -> EngineResult<Self> {
        Self::new(InstanceOptions::new())
    }

    /// Create a session.
    ///
    /// Each session gets its own cloned host connection so its current
    /// schema is isolated from other sessions.
    pub fn connect(
        &self,
        database: Option<&str>,
        schema: Option<&str>,
    ) -> EngineResult<Connection> {
        let duck = self.root.try_clone().map_err(classify_host_error)?;
        Connection::create(duck, database, schema, &self.options)
    }

    pub fn options(&self) -> &InstanceOptions {
        &self.options
    }
}
