//! Stage subsystem.
//!
//! Stages live as rows in the global catalog plus a local directory tree
//! under a process-wide temp root. PUT uploads GZIP-compressed files, LIST
//! reads the directory back through the host engine, GET downloads files to
//! a local directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use duckdb::Connection;
use flate2::write::GzEncoder;
use flate2::Compression;

use sm_sql::transforms::stage::{parts_from_var, StageCommand, StageDef};

use crate::catalog::{GLOBAL_DATABASE, RESERVED_SCHEMA};
use crate::error::{classify_host_error, EngineError, EngineResult};

static STAGE_ROOT: LazyLock<tempfile::TempDir> = LazyLock::new(|| {
    tempfile::Builder::new()
        .prefix("snowmock_bucket_")
        .tempdir()
        .expect("cannot create stage temp root")
});

/// Process-wide root of the internal stage directory tree.
pub fn stage_root() -> &'static Path {
    STAGE_ROOT.path()
}

/// Directory backing an internal stage.
pub fn stage_dir(database: &str, schema: &str, name: &str) -> PathBuf {
    stage_root().join(database).join(schema).join(name)
}

/// True when a path points into the internal stage tree.
pub fn is_internal(path: &str) -> bool {
    Path::new(path).starts_with(stage_root())
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn local_path(url: &str) -> &str {
    url.strip_prefix("file://").unwrap_or(url)
}

/// Look up a stage's URL; empty string means internal.
pub(crate) fn stage_url(
    duck: &Connection,
    database: &str,
    schema: &str,
    name: &str,
) -> EngineResult<Option<String>> {
    let sql = format!(
        "SELECT url FROM {GLOBAL_DATABASE}.{RESERVED_SCHEMA}._fs_stages \
         WHERE database_name = ? AND schema_name = ? AND name = ?"
    );
    let mut stmt = duck.prepare(&sql).map_err(classify_host_error)?;
    let mut rows = stmt
        .query([database, schema, name])
        .map_err(classify_host_error)?;
    match rows.next().map_err(classify_host_error)? {
        Some(row) => {
            let url: Option<String> = row.get(0).map_err(classify_host_error)?;
            Ok(Some(url.unwrap_or_default()))
        }
        None => Ok(None),
    }
}

/// Execute a stage statement; returns the host SQL producing the result rows.
pub(crate) fn execute_stage(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    command: &StageCommand,
) -> EngineResult<String> {
    match command {
        StageCommand::Create(def) => create_stage(duck, database, schema, def),
        StageCommand::Drop { name, if_exists } => {
            drop_stage(duck, database, schema, name, *if_exists)
        }
        StageCommand::Put { src_url, stage } => put(duck, database, schema, src_url, stage),
        StageCommand::List { stage } => list(duck, database, schema, stage),
        StageCommand::Get { stage, dest_url } => get(duck, database, schema, stage, dest_url),
    }
}

fn create_stage(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    def: &StageDef,
) -> EngineResult<String> {
    let (db, sch, name) = parts_from_var(&def.name, database, schema, "CREATE STAGE")?;

    let exists = stage_url(duck, &db, &sch, &name)?.is_some();
    if exists && def.or_replace {
        duck.execute(
            &format!(
                "DELETE FROM {GLOBAL_DATABASE}.{RESERVED_SCHEMA}._fs_stages \
                 WHERE database_name = ? AND schema_name = ? AND name = ?"
            ),
            [db.as_str(), sch.as_str(), name.as_str()],
        )
        .map_err(classify_host_error)?;
    } else if exists && def.if_not_exists {
        return Ok(status_sql(&format!(
            "Stage area {name} successfully created."
        )));
    } else if exists {
        return Err(EngineError::AlreadyExists(name));
    }

    let cloud = if def.url.starts_with("s3://") {
        "'AWS'"
    } else {
        "NULL"
    };
    let stage_type = format!(
        "{}{}",
        if def.url.is_empty() { "INTERNAL" } else { "EXTERNAL" },
        if def.temporary { " TEMPORARY" } else { "" }
    );

    let insert = format!(
        "INSERT INTO {GLOBAL_DATABASE}.{RESERVED_SCHEMA}._fs_stages \
         (created_on, name, database_name, schema_name, url, has_credentials, has_encryption_key, \
          owner, comment, region, type, cloud, notification_channel, storage_integration, \
          endpoint, owner_role_type, directory_enabled) \
         VALUES (now(), '{}', '{}', '{}', '{}', 'N', 'N', 'SYSADMIN', '', NULL, '{}', {}, NULL, \
          NULL, NULL, 'ROLE', 'N')",
        escape(&name),
        escape(&db),
        escape(&sch),
        escape(&def.url),
        stage_type,
        cloud,
    );
    duck.execute_batch(&insert).map_err(classify_host_error)?;

    Ok(status_sql(&format!(
        "Stage area {name} successfully created."
    )))
}

fn drop_stage(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    name: &str,
    if_exists: bool,
) -> EngineResult<String> {
    let (db, sch, name) = parts_from_var(name, database, schema, "DROP STAGE")?;
    let affected = duck
        .execute(
            &format!(
                "DELETE FROM {GLOBAL_DATABASE}.{RESERVED_SCHEMA}._fs_stages \
                 WHERE database_name = ? AND schema_name = ? AND name = ?"
            ),
            [db.as_str(), sch.as_str(), name.as_str()],
        )
        .map_err(classify_host_error)?;

    if affected == 0 && !if_exists {
        return Err(EngineError::StageNotFound(format!("{db}.{sch}.{name}")));
    }
    Ok(status_sql(&format!("{name} successfully dropped.")))
}

fn resolve_internal_stage(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    stage: &str,
    command: &str,
) -> EngineResult<(String, String, String)> {
    let (db, sch, name) = parts_from_var(stage, database, schema, command)?;
    match stage_url(duck, &db, &sch, &name)? {
        None => Err(EngineError::StageNotFound(format!("{db}.{sch}.{name}"))),
        Some(url) if !url.is_empty() => Err(EngineError::Unsupported(format!(
            "{command} on an external stage"
        ))),
        Some(_) => Ok((db, sch, name)),
    }
}

fn put(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    src_url: &str,
    stage: &str,
) -> EngineResult<String> {
    let (db, sch, name) = resolve_internal_stage(duck, database, schema, stage, "PUT")?;

    let src_path = local_path(src_url);
    let data = std::fs::read(src_path)
        .map_err(|e| EngineError::CopyIo(format!("cannot read {src_path}: {e}")))?;

    let basename = Path::new(src_path)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EngineError::CopyIo(format!("invalid source path {src_path}")))?;

    let dir = stage_dir(&db, &sch, &name);
    std::fs::create_dir_all(&dir)
        .map_err(|e| EngineError::CopyIo(format!("cannot create stage dir: {e}")))?;

    let (target, compressed) = if basename.ends_with(".gz") {
        (basename.to_string(), data.clone())
    } else {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&data)
            .and_then(|_| encoder.finish())
            .map(|compressed| (format!("{basename}.gz"), compressed))
            .map_err(|e| EngineError::CopyIo(format!("gzip failed: {e}")))?
    };

    std::fs::write(dir.join(&target), &compressed)
        .map_err(|e| EngineError::CopyIo(format!("cannot write stage file: {e}")))?;

    Ok(format!(
        "SELECT * FROM (VALUES ('{src}', '{tgt}', {src_size}, {tgt_size}, 'NONE', 'GZIP', \
         'UPLOADED', '')) AS t(source, target, source_size, target_size, source_compression, \
         target_compression, status, message)",
        src = escape(basename),
        tgt = escape(&target),
        src_size = data.len(),
        tgt_size = compressed.len(),
    ))
}

fn list(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    stage: &str,
) -> EngineResult<String> {
    let (db, sch, name) = resolve_internal_stage(duck, database, schema, stage, "LIST")?;
    let dir = stage_dir(&db, &sch, &name);

    if !dir.is_dir() {
        return Ok(
            "SELECT NULL::VARCHAR AS name, NULL::BIGINT AS size, NULL::VARCHAR AS md5, \
             NULL::VARCHAR AS last_modified WHERE 0 = 1"
                .to_string(),
        );
    }

    Ok(format!(
        "SELECT \
            lower(split_part(filename, '/', -2)) || '/' || split_part(filename, '/', -1) AS name, \
            size, \
            md5(content) AS md5, \
            strftime(last_modified, '%a, %d %b %Y %H:%M:%S GMT') AS last_modified \
         FROM read_blob('{}/*') ORDER BY name",
        escape(&dir.display().to_string())
    ))
}

fn get(
    duck: &Connection,
    database: Option<&str>,
    schema: Option<&str>,
    stage: &str,
    dest_url: &str,
) -> EngineResult<String> {
    let (db, sch, name) = resolve_internal_stage(duck, database, schema, stage, "GET")?;
    let dir = stage_dir(&db, &sch, &name);
    let dest = PathBuf::from(local_path(dest_url));
    std::fs::create_dir_all(&dest)
        .map_err(|e| EngineError::CopyIo(format!("cannot create target dir: {e}")))?;

    let mut rows: Vec<String> = Vec::new();
    if dir.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(&dir)
            .map_err(|e| EngineError::CopyIo(e.to_string()))?
            .filter_map(Result::ok)
            .collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            std::fs::copy(entry.path(), dest.join(&file_name))
                .map_err(|e| EngineError::CopyIo(format!("cannot download {file_name}: {e}")))?;
            rows.push(format!("('{}', {size}, 'DOWNLOADED', '')", escape(&file_name)));
        }
    }

    if rows.is_empty() {
        return Ok(
            "SELECT NULL::VARCHAR AS file, NULL::BIGINT AS size, NULL::VARCHAR AS status, \
             NULL::VARCHAR AS message WHERE 0 = 1"
                .to_string(),
        );
    }
    Ok(format!(
        "SELECT * FROM (VALUES {}) AS t(file, size, status, message)",
        rows.join(", ")
    ))
}

fn status_sql(message: &str) -> String {
    format!("SELECT '{}' AS status", escape(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_dir_layout() {
        let dir = stage_dir("DB1", "SCHEMA1", "ST1");
        assert!(dir.starts_with(stage_root()));
        assert!(dir.ends_with("DB1/SCHEMA1/ST1"));
    }

    #[test]
    fn test_is_internal() {
        let dir = stage_dir("DB1", "S1", "ST");
        assert!(is_internal(&dir.display().to_string()));
        assert!(!is_internal("/somewhere/else"));
    }

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("file:///tmp/foo.csv"), "/tmp/foo.csv");
        assert_eq!(local_path("/tmp/foo.csv"), "/tmp/foo.csv");
    }
}
