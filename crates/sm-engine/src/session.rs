//! Session (connection) lifecycle.
//!
//! A session owns one cloned host connection, its current database and
//! schema, a variables store, and a small cache of recent results keyed by
//! statement id. The reserved information-schema name is substituted on the
//! way in and reversed on the way out.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arrow::record_batch::RecordBatch;

use crate::catalog;
use crate::cursor::Cursor;
use crate::error::{classify_host_error, EngineError, EngineResult};
use crate::instance::{InstanceOptions, ParamStyle};
use crate::macros;
use crate::variables::Variables;

/// Number of completed results kept for RESULT_SCAN-style lookup.
const RESULT_CACHE_SIZE: usize = 20;

/// Substitute the reserved information-schema name on write.
pub(crate) fn internal_schema_name(schema: &str) -> String {
    let upper = schema.to_uppercase();
    if upper == "INFORMATION_SCHEMA" {
        catalog::RESERVED_SCHEMA.to_uppercase()
    } else {
        upper
    }
}

pub(crate) struct SessionState {
    pub duck: duckdb::Connection,
    pub database: Option<String>,
    /// Internal (substituted) schema name
    pub schema: Option<String>,
    pub database_set: bool,
    pub schema_set: bool,
    pub db_path: Option<PathBuf>,
    pub nop_regexes: Vec<regex::Regex>,
    pub paramstyle: ParamStyle,
    pub variables: Variables,
    pub autocommit: bool,
    pub in_transaction: bool,
    pub closed: bool,
    results: VecDeque<(String, Vec<RecordBatch>)>,
}

impl SessionState {
    /// User-visible schema name (reverse substitution).
    pub fn public_schema(&self) -> Option<String> {
        self.schema.as_ref().map(|s| {
            if s.eq_ignore_ascii_case(catalog::RESERVED_SCHEMA) {
                "INFORMATION_SCHEMA".to_string()
            } else {
                s.clone()
            }
        })
    }

    pub fn cache_result(&mut self, sfqid: &str, batches: Vec<RecordBatch>) {
        if self.results.len() >= RESULT_CACHE_SIZE {
            self.results.pop_front();
        }
        self.results.push_back((sfqid.to_string(), batches));
    }

    pub fn cached_result(&self, sfqid: &str) -> Option<&Vec<RecordBatch>> {
        self.results
            .iter()
            .find(|(id, _)| id == sfqid)
            .map(|(_, batches)| batches)
    }

    fn schema_exists(&self, database: &str, schema: &str) -> EngineResult<bool> {
        query_exists(
            &self.duck,
            "SELECT 1 FROM information_schema.schemata \
             WHERE upper(catalog_name) = ? AND upper(schema_name) = ?",
            &[database, &schema.to_uppercase()],
        )
    }

    fn database_exists(&self, database: &str) -> EngineResult<bool> {
        query_exists(
            &self.duck,
            "SELECT 1 FROM information_schema.schemata WHERE upper(catalog_name) = ?",
            &[database],
        )
    }
}

fn query_exists(duck: &duckdb::Connection, sql: &str, params: &[&str]) -> EngineResult<bool> {
    let mut stmt = duck.prepare(sql).map_err(classify_host_error)?;
    let mut rows = stmt
        .query(duckdb::params_from_iter(params))
        .map_err(classify_host_error)?;
    Ok(rows.next().map_err(classify_host_error)?.is_some())
}

/// A warehouse session.
///
/// Clones share the same session state; cursors hold their own reference.
#[derive(Clone)]
pub struct Connection {
    pub(crate) state: Arc<Mutex<SessionState>>,
}

impl Connection {
    pub(crate) fn create(
        duck: duckdb::Connection,
        database: Option<&str>,
        schema: Option<&str>,
        options: &InstanceOptions,
    ) -> EngineResult<Self> {
        // upper case like unquoted identifiers so the names round-trip
        // through the host's information schema
        let database = database.map(|d| d.to_uppercase());
        let schema = schema.map(|s| internal_schema_name(s));

        // anchored at the start of the statement, like the patterns the
        // real driver matches with
        let nop_regexes = options
            .nop_regexes
            .iter()
            .map(|p| {
                regex::RegexBuilder::new(&format!("^(?:{p})"))
                    .case_insensitive(true)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::Compilation(format!("invalid NOP regex: {e}")))?;

        let mut state = SessionState {
            duck,
            database: database.clone(),
            schema: schema.clone(),
            database_set: false,
            schema_set: false,
            db_path: options.db_path.clone(),
            nop_regexes,
            paramstyle: options.paramstyle,
            variables: Variables::new(),
            autocommit: true,
            in_transaction: false,
            closed: false,
            results: VecDeque::new(),
        };

        if let Some(db) = &database {
            if options.create_database && !state.database_exists(db)? {
                let db_file = match &state.db_path {
                    Some(path) => path.join(format!("{db}.db")).display().to_string(),
                    None => ":memory:".to_string(),
                };
                state
                    .duck
                    .execute_batch(&format!("ATTACH DATABASE '{db_file}' AS {db}"))
                    .map_err(classify_host_error)?;
                state
                    .duck
                    .execute_batch(&catalog::per_db_creation_sql(db))
                    .map_err(classify_host_error)?;
                state
                    .duck
                    .execute_batch(&macros::creation_sql(db))
                    .map_err(classify_host_error)?;
            }

            if let Some(sch) = &schema {
                if options.create_schema && !state.schema_exists(db, sch)? {
                    state
                        .duck
                        .execute_batch(&format!("CREATE SCHEMA {db}.{sch}"))
                        .map_err(classify_host_error)?;
                }
            }

            // point the host connection at what exists
            if let Some(sch) = &schema {
                if state.schema_exists(db, sch)? {
                    state
                        .duck
                        .execute_batch(&format!("SET schema = '{db}.{sch}'"))
                        .map_err(classify_host_error)?;
                    state.database_set = true;
                    state.schema_set = true;
                }
            }
            if !state.database_set && state.database_exists(db)? {
                state
                    .duck
                    .execute_batch(&format!("SET schema = '{db}.main'"))
                    .map_err(classify_host_error)?;
                state.database_set = true;
            }
        }

        // UTC for deterministic timestamps; the setting only exists when
        // the host build ships the ICU extension
        if let Err(e) = state.duck.execute_batch("SET GLOBAL TimeZone = 'UTC'") {
            log::debug!("cannot set host time zone: {e}");
        }

        Ok(Connection {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Open a cursor on this session.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(Arc::clone(&self.state))
    }

    /// Execute one statement and return its cursor.
    pub fn execute(&self, sql: &str) -> EngineResult<Cursor> {
        let mut cursor = self.cursor();
        cursor.execute(sql)?;
        Ok(cursor)
    }

    /// Execute a script, one cursor per statement. Pure-comment fragments
    /// are ignored.
    pub fn execute_string(&self, text: &str) -> EngineResult<Vec<Cursor>> {
        let mut cursors = Vec::new();
        for statement in sm_sql::parser::split_statements(text) {
            let mut cursor = self.cursor();
            cursor.execute(&statement)?;
            cursors.push(cursor);
        }
        Ok(cursors)
    }

    pub fn commit(&self) -> EngineResult<()> {
        self.cursor().execute("COMMIT")?;
        self.restart_transaction_if_needed()
    }

    pub fn rollback(&self) -> EngineResult<()> {
        self.cursor().execute("ROLLBACK")?;
        self.restart_transaction_if_needed()
    }

    /// Toggle autocommit. Turning it off opens a transaction immediately,
    /// matching driver behaviour.
    pub fn autocommit(&self, autocommit: bool) -> EngineResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.autocommit = autocommit;
        }
        self.restart_transaction_if_needed()
    }

    fn restart_transaction_if_needed(&self) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.autocommit && !state.in_transaction {
            state
                .duck
                .execute_batch("BEGIN TRANSACTION")
                .map_err(classify_host_error)?;
            state.in_transaction = true;
        }
        Ok(())
    }

    /// Current database, if set.
    pub fn database(&self) -> Option<String> {
        self.state.lock().unwrap().database.clone()
    }

    /// Current schema (user-visible name), if set.
    pub fn schema(&self) -> Option<String> {
        self.state.lock().unwrap().public_schema()
    }

    /// A recently completed result by statement id, if still cached.
    pub fn cached_result(&self, sfqid: &str) -> Option<Vec<RecordBatch>> {
        self.state.lock().unwrap().cached_result(sfqid).cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Close the session. Later statements fail with a connection error.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
    }
}
