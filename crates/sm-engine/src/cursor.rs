//! Cursor execution loop.
//!
//! One `execute` call: inline variables → bind parameters → NOP check →
//! route → (checks → transform pipeline → host statements) → execute each on
//! the host → synthesise the warehouse-shaped status or data result → cache
//! the columnar batch.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use arrow::record_batch::RecordBatch;
use regex::Regex;

use sm_sql::command::{key_command, object_name};
use sm_sql::route::{Routed, UseTarget};
use sm_sql::transforms::{CtasPlan, HostStatement, TransformContext};
use sm_sql::IdentPart;

use crate::batch;
use crate::catalog;
use crate::copy;
use crate::error::{classify_host_error, is_no_active_transaction, EngineError, EngineResult};
use crate::instance::ParamStyle;
use crate::macros;
use crate::rowtype::{self, ColumnInfo};
use crate::session::{internal_schema_name, SessionState};
use crate::stage;
use crate::value::Value;

const SQL_SUCCESS: &str = "SELECT 'Statement executed successfully.' AS status";

/// `IDENTIFIER(?)` whose literal the translator must read.
static IDENTIFIER_QMARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)IDENTIFIER\s*\(\s*\?\s*\)").expect("valid regex literal"));

fn status_sql(message: &str) -> String {
    format!("SELECT '{}' AS status", message.replace('\'', "''"))
}

fn created_sql(kind: &str, name: &str) -> String {
    status_sql(&format!("{kind} {name} successfully created."))
}

fn dropped_sql(name: &str) -> String {
    status_sql(&format!("{name} successfully dropped."))
}

fn inserted_sql(count: usize) -> String {
    format!("SELECT {count} AS \"number of rows inserted\"")
}

fn updated_sql(count: usize) -> String {
    format!(
        "SELECT {count} AS \"number of rows updated\", 0 AS \"number of multi-joined rows updated\""
    )
}

fn deleted_sql(count: usize) -> String {
    format!("SELECT {count} AS \"number of rows deleted\"")
}

/// A cursor over one session.
pub struct Cursor {
    state: Arc<Mutex<SessionState>>,
    batches: Vec<RecordBatch>,
    has_result: bool,
    fetch_index: usize,
    last_sql: Option<String>,
    last_params: Vec<Value>,
    sqlstate: Option<&'static str>,
    rowcount: Option<i64>,
    sfqid: Option<String>,
    arraysize: usize,
}

/// Result of executing one routed statement.
struct Outcome {
    batches: Vec<RecordBatch>,
    /// SQL whose DESCRIBE yields the result metadata
    result_sql: String,
    /// Affected-row count for DML, if any
    affected: Option<usize>,
}

impl Cursor {
    pub(crate) fn new(state: Arc<Mutex<SessionState>>) -> Self {
        Cursor {
            state,
            batches: Vec::new(),
            has_result: false,
            fetch_index: 0,
            last_sql: None,
            last_params: Vec::new(),
            sqlstate: None,
            rowcount: None,
            sfqid: None,
            arraysize: 1,
        }
    }

    /// Execute one statement.
    pub fn execute(&mut self, sql: &str) -> EngineResult<&mut Self> {
        self.execute_with_params(sql, &[])
    }

    /// Execute one statement with bound parameters.
    pub fn execute_with_params(&mut self, sql: &str, params: &[Value]) -> EngineResult<&mut Self> {
        match self.try_execute(sql, params) {
            Ok(()) => Ok(self),
            Err(e) => {
                self.sqlstate = Some(e.sqlstate());
                Err(e)
            }
        }
    }

    /// Execute once per parameter set.
    pub fn executemany(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> EngineResult<&mut Self> {
        for params in param_sets {
            self.execute_with_params(sql, params)?;
        }
        Ok(self)
    }

    fn try_execute(&mut self, sql: &str, params: &[Value]) -> EngineResult<()> {
        self.batches.clear();
        self.has_result = false;
        self.fetch_index = 0;
        self.rowcount = None;
        self.sfqid = None;
        self.sqlstate = None;
        self.last_sql = None;
        self.last_params = Vec::new();

        let state = Arc::clone(&self.state);
        let mut guard = state.lock().unwrap();
        if guard.closed {
            return Err(EngineError::ConnectionLost(
                "session has been closed".to_string(),
            ));
        }

        let sql = guard.variables.inline(sql)?;
        let mut params = params.to_vec();
        let sql = bind_params(&sql, &mut params, guard.paramstyle)?;

        if guard.nop_regexes.iter().any(|re| re.is_match(&sql)) {
            let outcome = run_result_query(&mut guard, SQL_SUCCESS, &[])?;
            self.finish(&mut guard, outcome, Vec::new());
            return Ok(());
        }

        let database = guard.database.clone();
        let schema = guard.schema.clone();
        let db_path = guard.db_path.clone();
        let ctx = TransformContext {
            database: database.as_deref(),
            schema: schema.as_deref(),
            db_path: db_path.as_deref(),
        };

        let routed = sm_sql::route(&sql, &ctx)?;
        let outcome = match routed {
            Routed::SetVariable { name, value } => {
                guard.variables.set(&name, &value);
                run_result_query(&mut guard, SQL_SUCCESS, &[])?
            }
            Routed::UnsetVariable { name } => {
                guard.variables.unset(&name);
                run_result_query(&mut guard, SQL_SUCCESS, &[])?
            }
            Routed::Use(target) => self.execute_use(&mut guard, target)?,
            Routed::Query { sql } => run_result_query(&mut guard, &sql, &[])?,
            Routed::Stage(command) => {
                let result_sql = stage::execute_stage(
                    &guard.duck,
                    database.as_deref(),
                    schema.as_deref(),
                    &command,
                )?;
                run_result_query(&mut guard, &result_sql, &[])?
            }
            Routed::CopyInto(copy_plan) => {
                let result_sql = copy::execute_copy(
                    &guard.duck,
                    database.as_deref(),
                    schema.as_deref(),
                    &copy_plan,
                )?;
                run_result_query(&mut guard, &result_sql, &[])?
            }
            Routed::CreateUser { name } => {
                guard
                    .duck
                    .execute_batch(&catalog::insert_user_sql(&name))
                    .map_err(classify_host_error)?;
                run_result_query(&mut guard, SQL_SUCCESS, &[])?
            }
            Routed::TableComment { table, comment } => {
                upsert_table_comment(&mut guard, &table, &comment, &ctx)?;
                run_result_query(&mut guard, SQL_SUCCESS, &[])?
            }
            Routed::Nop => run_result_query(&mut guard, SQL_SUCCESS, &[])?,
            Routed::Parsed {
                statements,
                table_comment,
            } => {
                let mut last_outcome = None;
                let count = statements.len();
                for (i, statement) in statements.into_iter().enumerate() {
                    let comment = if i == 0 { table_comment.clone() } else { None };
                    let outcome = self.execute_parsed(
                        &mut guard,
                        statement,
                        &ctx,
                        comment,
                        &mut params,
                    )?;
                    if i == count - 1 {
                        last_outcome = Some(outcome);
                    }
                }
                last_outcome.ok_or_else(|| {
                    EngineError::Compilation("Empty SQL statement.".to_string())
                })?
            }
        };

        self.finish(&mut guard, outcome, params);
        Ok(())
    }

    fn finish(&mut self, guard: &mut MutexGuard<'_, SessionState>, outcome: Outcome, params: Vec<Value>) {
        self.rowcount = Some(
            outcome
                .affected
                .map(|a| a as i64)
                .unwrap_or_else(|| batch::row_count(&outcome.batches) as i64),
        );
        let sfqid = uuid::Uuid::new_v4().to_string();
        guard.cache_result(&sfqid, outcome.batches.clone());
        self.sfqid = Some(sfqid);
        self.batches = outcome.batches;
        self.has_result = true;
        self.last_sql = Some(outcome.result_sql);
        self.last_params = params;
    }

    fn execute_use(
        &mut self,
        guard: &mut MutexGuard<'_, SessionState>,
        target: UseTarget,
    ) -> EngineResult<Outcome> {
        match target {
            UseTarget::Database(database) => {
                guard
                    .duck
                    .execute_batch(&format!("SET schema = '{database}.main'"))
                    .map_err(classify_host_error)?;
                guard.database = Some(database);
                guard.database_set = true;
            }
            UseTarget::Schema { database, schema } => {
                let db = database
                    .or_else(|| guard.database.clone())
                    .ok_or_else(|| EngineError::MissingDatabase {
                        command: "USE SCHEMA".to_string(),
                    })?;
                let internal = internal_schema_name(&schema);
                guard
                    .duck
                    .execute_batch(&format!("SET schema = '{db}.{internal}'"))
                    .map_err(classify_host_error)?;
                guard.schema = Some(internal);
                guard.schema_set = true;
            }
            UseTarget::Noop => {}
        }
        run_result_query(guard, SQL_SUCCESS, &[])
    }

    /// Execute one parsed statement through checks, transforms, and the host.
    fn execute_parsed(
        &mut self,
        guard: &mut MutexGuard<'_, SessionState>,
        statement: sqlparser::ast::Statement,
        ctx: &TransformContext,
        table_comment: Option<String>,
        params: &mut Vec<Value>,
    ) -> EngineResult<Outcome> {
        let rendered = statement.to_string();
        let cmd = key_command(&rendered);
        let object = object_name(&rendered);

        let qualification = sm_sql::checks::is_unqualified_table_expression(&statement, &cmd);
        if qualification.missing_database && !guard.database_set {
            return Err(EngineError::MissingDatabase { command: cmd });
        }
        if qualification.missing_schema && !guard.schema_set {
            return Err(EngineError::MissingSchema { command: cmd });
        }

        let hosts = sm_sql::transform_statement(statement, ctx, table_comment)?;

        // MERGE expands to DML that reads the host's row ids; a transaction
        // keeps them stable across the sequence
        let wrap_merge = cmd == "MERGE" && guard.autocommit && !guard.in_transaction;
        if wrap_merge {
            guard
                .duck
                .execute_batch("BEGIN TRANSACTION")
                .map_err(classify_host_error)?;
        }

        let mut outcome = None;
        let count = hosts.len();
        for (i, host) in hosts.iter().enumerate() {
            let last = i == count - 1;
            let result = self.execute_host(guard, host, &cmd, object.as_deref(), params, last);
            match result {
                Ok(o) => {
                    if last {
                        outcome = o;
                    }
                }
                Err(e) => {
                    if wrap_merge {
                        let _ = guard.duck.execute_batch("ROLLBACK");
                    }
                    return Err(e);
                }
            }
        }
        if wrap_merge {
            guard
                .duck
                .execute_batch("COMMIT")
                .map_err(classify_host_error)?;
        }

        outcome.ok_or_else(|| EngineError::Internal("statement produced no result".to_string()))
    }

    /// Execute one host statement; returns an outcome only for the last.
    fn execute_host(
        &mut self,
        guard: &mut MutexGuard<'_, SessionState>,
        host: &HostStatement,
        cmd: &str,
        object: Option<&str>,
        params: &mut Vec<Value>,
        last: bool,
    ) -> EngineResult<Option<Outcome>> {
        if let Some(ctas) = &host.tags.ctas {
            run_ctas(guard, ctas)?;
            self.apply_catalog_tags(guard, host)?;
            if !last {
                return Ok(None);
            }
            let name = object.unwrap_or_default();
            return Ok(Some(run_result_query(
                guard,
                &created_sql("Table", name),
                &[],
            )?));
        }

        let host_cmd = key_command(&host.sql);
        let data_returning = matches!(host_cmd.as_str(), "SELECT" | "DESCRIBE" | "VALUES");

        let outcome = if data_returning {
            if let Some(seed) = &host.tags.seed {
                guard
                    .duck
                    .execute_batch(&format!("SELECT setseed({seed})"))
                    .map_err(classify_host_error)?;
            }
            if last {
                Some(run_result_query(guard, &host.sql, params)?)
            } else {
                run_host_batch(guard, &host.sql)?;
                None
            }
        } else {
            match cmd {
                "INSERT" | "UPDATE" | "DELETE" => {
                    let affected = run_host_execute(guard, &host.sql, params)?;
                    if !last {
                        None
                    } else {
                        let result_sql = match cmd {
                            "INSERT" => inserted_sql(affected),
                            "UPDATE" => updated_sql(affected),
                            _ => deleted_sql(affected),
                        };
                        let mut o = run_result_query(guard, &result_sql, &[])?;
                        o.affected = Some(affected);
                        Some(o)
                    }
                }
                "BEGIN" => {
                    run_host_batch(guard, &host.sql)?;
                    guard.in_transaction = true;
                    last.then(|| run_result_query(guard, SQL_SUCCESS, &[]))
                        .transpose()?
                }
                "COMMIT" | "ROLLBACK" => {
                    // a COMMIT/ROLLBACK outside a transaction succeeds
                    match guard.duck.execute_batch(&host.sql) {
                        Ok(()) => {}
                        Err(e) if is_no_active_transaction(&e) => {}
                        Err(e) => return Err(classify_host_error(e)),
                    }
                    guard.in_transaction = false;
                    last.then(|| run_result_query(guard, SQL_SUCCESS, &[]))
                        .transpose()?
                }
                _ => {
                    // DDL and remaining commands
                    if guard.in_transaction
                        && matches!(cmd, "CREATE DATABASE" | "DROP DATABASE")
                    {
                        // the host cannot ATTACH/DETACH inside a transaction
                        run_host_batch(guard, "COMMIT")?;
                        guard.in_transaction = false;
                    }
                    if cmd == "DROP DATABASE" && guard.database.as_deref() == object {
                        // the host refuses to detach its default database
                        run_host_batch(guard, "SET schema = 'memory.main'")?;
                    }
                    run_host_batch(guard, &host.sql)?;
                    self.post_ddl(guard, host, cmd, object)?;
                    if !last {
                        None
                    } else {
                        let result_sql = self.ddl_status(cmd, object, host);
                        Some(run_result_query(guard, &result_sql, &[])?)
                    }
                }
            }
        };

        self.apply_catalog_tags(guard, host)?;
        Ok(outcome)
    }

    /// Side effects after a DDL statement lands on the host.
    fn post_ddl(
        &mut self,
        guard: &mut MutexGuard<'_, SessionState>,
        host: &HostStatement,
        cmd: &str,
        object: Option<&str>,
    ) -> EngineResult<()> {
        if let Some(db) = &host.tags.create_db_name {
            // a new database needs its catalog extensions and macros
            guard
                .duck
                .execute_batch(&catalog::per_db_creation_sql(db))
                .map_err(classify_host_error)?;
            guard
                .duck
                .execute_batch(&macros::creation_sql(db))
                .map_err(classify_host_error)?;
        }

        // dropping the current database or schema resets the session
        if cmd == "DROP DATABASE" {
            if guard.database.as_deref() == object {
                guard.database = None;
                guard.schema = None;
            }
        } else if cmd == "DROP SCHEMA" && guard.schema.as_deref() == object {
            guard.schema = None;
        }
        Ok(())
    }

    fn ddl_status(&self, cmd: &str, object: Option<&str>, host: &HostStatement) -> String {
        let name = object.unwrap_or_default();
        match cmd {
            "CREATE DATABASE" => {
                let db = host.tags.create_db_name.as_deref().unwrap_or(name);
                created_sql("Database", db)
            }
            "CREATE SCHEMA" => created_sql("Schema", name),
            "CREATE TABLE" => created_sql("Table", name),
            "CREATE VIEW" => created_sql("View", name),
            "CREATE SEQUENCE" => created_sql("Sequence", name),
            c if c.starts_with("DROP") => dropped_sql(name),
            _ => SQL_SUCCESS.to_string(),
        }
    }

    /// Comment and text-length annotations drive catalog upserts.
    fn apply_catalog_tags(
        &mut self,
        guard: &mut MutexGuard<'_, SessionState>,
        host: &HostStatement,
    ) -> EngineResult<()> {
        if let Some((table, comment)) = &host.tags.table_comment {
            let catalog_name = table
                .catalog
                .clone()
                .or_else(|| guard.database.clone());
            let schema_name = table.schema.clone().or_else(|| guard.schema.clone());
            if let (Some(catalog_name), Some(schema_name)) = (catalog_name, schema_name) {
                guard
                    .duck
                    .execute_batch(&catalog::insert_table_comment_sql(
                        &catalog_name,
                        &schema_name,
                        &table.name,
                        comment,
                    ))
                    .map_err(classify_host_error)?;
            }
        }

        if !host.tags.text_lengths.is_empty() {
            if let Some(table) = &host.tags.text_lengths_table {
                let catalog_name = table
                    .catalog
                    .clone()
                    .or_else(|| guard.database.clone());
                let schema_name = table.schema.clone().or_else(|| guard.schema.clone());
                if let (Some(catalog_name), Some(schema_name)) = (catalog_name, schema_name) {
                    guard
                        .duck
                        .execute_batch(&catalog::insert_text_lengths_sql(
                            &catalog_name,
                            &schema_name,
                            &table.name,
                            &host.tags.text_lengths,
                        ))
                        .map_err(classify_host_error)?;
                }
            }
        }
        Ok(())
    }

    // ---- result access ----

    fn require_result(&self) -> EngineResult<()> {
        if self.has_result {
            Ok(())
        } else {
            Err(EngineError::Internal("No open result set".to_string()))
        }
    }

    /// Fetch the next row.
    pub fn fetchone(&mut self) -> EngineResult<Option<Vec<Value>>> {
        Ok(self.fetchmany(Some(1))?.into_iter().next())
    }

    /// Fetch the next `size` rows (`arraysize` when unspecified).
    pub fn fetchmany(&mut self, size: Option<usize>) -> EngineResult<Vec<Vec<Value>>> {
        self.require_result()?;
        let size = size.unwrap_or(self.arraysize);
        let rows = batch::rows(&self.batches, self.fetch_index, size)?;
        self.fetch_index += size;
        Ok(rows)
    }

    /// Fetch all remaining rows.
    pub fn fetchall(&mut self) -> EngineResult<Vec<Vec<Value>>> {
        self.require_result()?;
        self.fetchmany(Some(batch::row_count(&self.batches)))
    }

    /// Fetch all remaining rows as name → value maps (dict-style results).
    pub fn fetchall_maps(
        &mut self,
    ) -> EngineResult<Vec<std::collections::HashMap<String, Value>>> {
        let names = self.column_names();
        Ok(self
            .fetchall()?
            .into_iter()
            .map(|row| names.iter().cloned().zip(row).collect())
            .collect())
    }

    /// Result column names, in order.
    pub fn column_names(&self) -> Vec<String> {
        self.batches
            .first()
            .map(|b| {
                b.schema()
                    .fields()
                    .iter()
                    .map(|f| f.name().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The raw columnar result, re-sliced to wire-sized batches.
    pub fn get_result_batches(&self) -> Option<Vec<RecordBatch>> {
        self.has_result.then(|| batch::rebatch(&self.batches))
    }

    /// Result metadata for the last statement, shaped like the warehouse's.
    pub fn description(&self) -> EngineResult<Vec<ColumnInfo>> {
        let Some(last_sql) = &self.last_sql else {
            return Err(EngineError::Internal("No open result set".to_string()));
        };
        let guard = self.state.lock().unwrap();
        let describe = format!("DESCRIBE {last_sql}");
        let mut stmt = guard.duck.prepare(&describe).map_err(classify_host_error)?;

        let mut pairs: Vec<(String, String)> = Vec::new();
        let duck_params: Vec<duckdb::types::Value> = self
            .last_params
            .iter()
            .map(|p| p.to_duckdb())
            .collect::<EngineResult<_>>()?;
        let mut rows = stmt
            .query(duckdb::params_from_iter(duck_params))
            .map_err(classify_host_error)?;
        while let Some(row) = rows.next().map_err(classify_host_error)? {
            let name: String = row.get(0).map_err(classify_host_error)?;
            let column_type: String = row.get(1).map_err(classify_host_error)?;
            pairs.push((name, column_type));
        }
        rowtype::describe_as_rowtype(&pairs)
    }

    /// Serialise the result to Arrow IPC with warehouse field metadata.
    pub fn result_ipc(&self) -> EngineResult<Vec<u8>> {
        self.require_result()?;
        let rowtype = self.description()?;
        batch::to_ipc(&self.batches, &rowtype)
    }

    /// Synthetic statement id of the last execution.
    pub fn sfqid(&self) -> Option<&str> {
        self.sfqid.as_deref()
    }

    /// SQL-state of the last error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        self.sqlstate
    }

    /// Affected-row count or result size of the last statement.
    pub fn rowcount(&self) -> Option<i64> {
        self.rowcount
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, arraysize: usize) {
        self.arraysize = arraysize.max(1);
    }
}

// ---- host helpers ----

fn run_result_query(
    guard: &mut MutexGuard<'_, SessionState>,
    sql: &str,
    params: &[Value],
) -> EngineResult<Outcome> {
    log::debug!("host: {sql}");
    let mut stmt = guard.duck.prepare(sql).map_err(classify_host_error)?;
    let duck_params: Vec<duckdb::types::Value> = params
        .iter()
        .map(|p| p.to_duckdb())
        .collect::<EngineResult<_>>()?;
    let arrow = stmt
        .query_arrow(duckdb::params_from_iter(duck_params))
        .map_err(classify_host_error)?;
    let batches: Vec<RecordBatch> = arrow.collect();
    Ok(Outcome {
        batches,
        result_sql: sql.to_string(),
        affected: None,
    })
}

fn run_host_execute(
    guard: &mut MutexGuard<'_, SessionState>,
    sql: &str,
    params: &[Value],
) -> EngineResult<usize> {
    log::debug!("host: {sql}");
    let duck_params: Vec<duckdb::types::Value> = params
        .iter()
        .map(|p| p.to_duckdb())
        .collect::<EngineResult<_>>()?;
    guard
        .duck
        .execute(sql, duckdb::params_from_iter(duck_params))
        .map_err(classify_host_error)
}

fn run_host_batch(guard: &mut MutexGuard<'_, SessionState>, sql: &str) -> EngineResult<()> {
    log::debug!("host: {sql}");
    guard.duck.execute_batch(sql).map_err(classify_host_error)
}

/// Resolve a CTAS column list against the inner query with a DESCRIBE and
/// re-align the projection with casts and aliases.
fn run_ctas(guard: &mut MutexGuard<'_, SessionState>, plan: &CtasPlan) -> EngineResult<()> {
    let describe = format!("DESCRIBE {}", plan.query_sql);
    let mut stmt = guard.duck.prepare(&describe).map_err(classify_host_error)?;
    let mut rows = stmt.query([]).map_err(classify_host_error)?;
    let mut source_columns: Vec<String> = Vec::new();
    while let Some(row) = rows.next().map_err(classify_host_error)? {
        let name: String = row.get(0).map_err(classify_host_error)?;
        source_columns.push(name);
    }

    if source_columns.len() != plan.columns.len() {
        return Err(EngineError::ColumnDefinitionMismatch);
    }

    let projection: Vec<String> = source_columns
        .iter()
        .zip(&plan.columns)
        .map(|(source, (name, data_type))| {
            format!(
                "CAST(\"{}\" AS {data_type}) AS \"{name}\"",
                source.replace('"', "\"\"")
            )
        })
        .collect();

    let sql = format!(
        "{} AS SELECT {} FROM ({})",
        plan.create_prefix,
        projection.join(", "),
        plan.query_sql
    );
    log::debug!("host: {sql}");
    guard.duck.execute_batch(&sql).map_err(classify_host_error)
}

fn upsert_table_comment(
    guard: &mut MutexGuard<'_, SessionState>,
    table: &[IdentPart],
    comment: &str,
    _ctx: &TransformContext,
) -> EngineResult<()> {
    let (catalog_name, schema_name, name) = match table {
        [db, schema, name] => (
            Some(db.value.clone()),
            Some(schema.value.clone()),
            name.value.clone(),
        ),
        [schema, name] => (
            guard.database.clone(),
            Some(schema.value.clone()),
            name.value.clone(),
        ),
        [name] => (
            guard.database.clone(),
            guard.schema.clone(),
            name.value.clone(),
        ),
        _ => return Ok(()),
    };
    let (Some(catalog_name), Some(schema_name)) = (catalog_name, schema_name) else {
        return Err(EngineError::MissingDatabase {
            command: "COMMENT".to_string(),
        });
    };
    guard
        .duck
        .execute_batch(&catalog::insert_table_comment_sql(
            &catalog_name,
            &schema_name,
            &name,
            comment,
        ))
        .map_err(classify_host_error)
}

/// Client-side parameter handling.
///
/// pyformat/format substitute escaped literals into the text; qmark passes
/// `?` through to the host, except for `IDENTIFIER(?)` whose value the
/// translator must read.
fn bind_params(sql: &str, params: &mut Vec<Value>, style: ParamStyle) -> EngineResult<String> {
    let mut sql = sql.to_string();

    if matches!(style, ParamStyle::Qmark) {
        while let Some(m) = IDENTIFIER_QMARK_RE.find(&sql) {
            let index = sql[..m.start()].matches('?').count();
            if index >= params.len() {
                return Err(EngineError::Bind(
                    "not enough parameters for IDENTIFIER(?)".to_string(),
                ));
            }
            let value = params.remove(index);
            // the popped literal becomes the identifier itself, so the
            // router and parser see a plain (possibly quoted) name
            let replacement = match value {
                Value::Str(s) => s,
                other => other.to_string(),
            };
            sql.replace_range(m.range(), &replacement);
        }
        return Ok(sql);
    }

    if params.is_empty() {
        return Ok(sql);
    }

    // pyformat / format: escape-and-quote each value into the text
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut index = 0;
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.peek() {
                Some('s') => {
                    chars.next();
                    let value = params.get(index).ok_or_else(|| {
                        EngineError::Bind("not enough parameters for statement".to_string())
                    })?;
                    out.push_str(&value.sql_literal());
                    index += 1;
                }
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    params.clear();
    Ok(out)
}
