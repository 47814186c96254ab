//! COPY INTO execution.
//!
//! Resolves the source to concrete URLs (external location or internal stage
//! directory), runs one INSERT ... SELECT per file through the format's
//! reader function, records load history for idempotence, and shapes the
//! per-file status result.

use duckdb::Connection;

use sm_sql::transforms::copy_into::CopyInto;
use sm_sql::transforms::stage::parts_from_var;

use crate::catalog::RESERVED_SCHEMA;
use crate::error::{classify_host_error, EngineError, EngineResult};
use crate::stage;

struct LoadOutcome {
    url: String,
    status: &'static str,
    rows: usize,
    error_count: i32,
    error_limit: Option<i32>,
    first_error: Option<String>,
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Execute COPY INTO; returns the host SQL producing the status rows.
pub(crate) fn execute_copy(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    copy: &CopyInto,
) -> EngineResult<String> {
    let source = resolve_source(duck, database, schema, &copy.source)?;
    let urls = if copy.files.is_empty() {
        glob_source(duck, &source)?
    } else {
        if !source.contains("://") {
            return Err(EngineError::InvalidUrl(source));
        }
        copy.files.iter().map(|f| format!("{source}{f}")).collect()
    };

    if urls.is_empty() {
        return Ok("SELECT 'Copy executed with 0 files processed.' AS status".to_string());
    }

    let table_name = copy.table.last().map(|p| p.value.clone()).unwrap_or_default();
    let history_schema = match copy.table.len() {
        3 => copy.table[1].value.clone(),
        2 => copy.table[0].value.clone(),
        _ => schema.unwrap_or_default().to_string(),
    };
    let load_time = chrono::Utc::now().to_rfc3339();

    let mut outcomes: Vec<LoadOutcome> = Vec::with_capacity(urls.len());
    for url in urls {
        let loaded_before = previously_loaded(duck, &url)?;
        if loaded_before && !copy.force {
            outcomes.push(LoadOutcome {
                url,
                status: "LOAD_SKIPPED",
                rows: 0,
                error_count: 1,
                error_limit: None,
                first_error: Some("File was loaded before.".to_string()),
            });
            continue;
        }

        let insert = copy.insert_sql(&url);
        log::debug!("copy into: {insert}");
        let affected = duck.execute(&insert, []).map_err(classify_host_error)?;

        if copy.purge {
            let path = local_file_path(&url);
            if stage::is_internal(&path) {
                let _ = std::fs::remove_file(&path);
            }
        }

        outcomes.push(LoadOutcome {
            url,
            status: "LOADED",
            rows: affected,
            error_count: 0,
            error_limit: Some(1),
            first_error: None,
        });
    }

    record_history(duck, &history_schema, &table_name, &load_time, &outcomes)?;

    Ok(result_sql(&outcomes))
}

/// Resolve `@stage` references through the catalog; internal stages become
/// file URLs of their backing directory (with a trailing separator).
fn resolve_source(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    source: &str,
) -> EngineResult<String> {
    let Some(stage_ref) = source.strip_prefix('@') else {
        return Ok(source.to_string());
    };

    let (db, sch, name) = parts_from_var(stage_ref, database, schema, "COPY INTO")?;
    match stage::stage_url(duck, &db, &sch, &name)? {
        None => Err(EngineError::StageNotFound(format!("{db}.{sch}.{name}"))),
        Some(url) if url.is_empty() => Ok(format!(
            "file://{}/",
            stage::stage_dir(&db, &sch, &name).display()
        )),
        Some(url) => Ok(url),
    }
}

fn glob_source(duck: &Connection, source: &str) -> EngineResult<Vec<String>> {
    let glob = if source.starts_with("file://") {
        format!("{}/*", source.trim_end_matches('/'))
    } else {
        format!("{source}*")
    };
    let sql = format!("SELECT file FROM glob('{}')", escape(&glob));
    log::debug!("copy into glob: {sql}");

    let mut stmt = duck.prepare(&sql).map_err(classify_host_error)?;
    let mut rows = stmt.query([]).map_err(classify_host_error)?;
    let mut urls = Vec::new();
    while let Some(row) = rows.next().map_err(classify_host_error)? {
        let url: String = row.get(0).map_err(classify_host_error)?;
        urls.push(url);
    }
    Ok(urls)
}

fn previously_loaded(duck: &Connection, url: &str) -> EngineResult<bool> {
    let sql = format!(
        "SELECT 1 FROM {RESERVED_SCHEMA}._fs_load_history WHERE file_name = ? LIMIT 1"
    );
    let mut stmt = duck.prepare(&sql).map_err(classify_host_error)?;
    let mut rows = stmt.query([url]).map_err(classify_host_error)?;
    Ok(rows.next().map_err(classify_host_error)?.is_some())
}

fn record_history(
    duck: &Connection,
    schema: &str,
    table: &str,
    load_time: &str,
    outcomes: &[LoadOutcome],
) -> EngineResult<()> {
    let values: Vec<String> = outcomes
        .iter()
        .filter(|o| o.status != "LOAD_SKIPPED")
        .map(|o| {
            format!(
                "('{}', '{}', '{}', '{}', '{}', {}, {}, {}, NULL, NULL, NULL, {}, {})",
                escape(schema),
                escape(&o.url),
                escape(table),
                load_time,
                o.status,
                o.rows,
                o.rows,
                o.first_error
                    .as_ref()
                    .map(|e| format!("'{}'", escape(e)))
                    .unwrap_or_else(|| "NULL".to_string()),
                o.error_count,
                o.error_limit
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "NULL".to_string()),
            )
        })
        .collect();

    if values.is_empty() {
        return Ok(());
    }
    let sql = format!(
        "INSERT INTO {RESERVED_SCHEMA}._fs_load_history VALUES {}",
        values.join(", ")
    );
    duck.execute_batch(&sql).map_err(classify_host_error)?;
    Ok(())
}

/// Internal-stage files report as `<stage>/<basename>`; external URLs
/// verbatim.
fn result_file_name(url: &str) -> String {
    if !stage::is_internal(&local_file_path(url)) {
        return url.to_string();
    }
    let parts: Vec<&str> = url.split('/').collect();
    match parts.as_slice() {
        [.., stage, file] => format!("{}/{file}", stage.to_lowercase()),
        _ => url.to_string(),
    }
}

fn local_file_path(url: &str) -> String {
    url.strip_prefix("file://").unwrap_or(url).to_string()
}

fn result_sql(outcomes: &[LoadOutcome]) -> String {
    let rows: Vec<String> = outcomes
        .iter()
        .map(|o| {
            format!(
                "('{}', '{}', {}, {}, {}, {}, {}, NULL, NULL, NULL)",
                escape(&result_file_name(&o.url)),
                o.status,
                o.rows,
                o.rows,
                o.error_limit
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "NULL".to_string()),
                o.error_count,
                o.first_error
                    .as_ref()
                    .map(|e| format!("'{}'", escape(e)))
                    .unwrap_or_else(|| "NULL".to_string()),
            )
        })
        .collect();

    format!(
        "SELECT * FROM (VALUES {}) AS t(file, status, rows_parsed, rows_loaded, error_limit, \
         errors_seen, first_error, first_error_line, first_error_character, \
         first_error_column_name)",
        rows.join(", ")
    )
}
