//! The dialect transform pipeline.
//!
//! Each transform is a named function over the AST, applied in a fixed order.
//! Transforms either mutate the statement in place or set `override_sql` on
//! the statement's [`Tags`] when the host statement cannot be expressed as a
//! mutation of the parsed tree (ATTACH, NOP replacements, generated queries).
//! Order matters in the documented cases; the pipeline is a constant slice so
//! the order is auditable in one place.

pub mod copy_into;
pub mod ddl;
pub mod describe;
pub mod funcs;
pub mod merge;
pub mod relations;
pub mod semi;
pub mod show;
pub mod stage;
pub mod types;
pub(crate) mod walk;

use regex::Regex;
use sqlparser::ast::{ObjectName, ObjectNamePart, Statement};
use std::path::Path;
use std::sync::LazyLock;

use crate::error::SqlResult;
use crate::ident;

/// Session state the transforms need.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Current database (upper-cased) if set
    pub database: Option<&'a str>,
    /// Current schema (upper-cased, reserved name substituted) if set
    pub schema: Option<&'a str>,
    /// Directory for persistent database files; in-memory when absent
    pub db_path: Option<&'a Path>,
}

/// A table reference resolved from an object name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRef {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    /// Build from a parsed object name (1-3 parts).
    pub fn from_object_name(name: &ObjectName) -> Self {
        let values: Vec<String> = name
            .0
            .iter()
            .map(|p| match p {
                ObjectNamePart::Identifier(ident) => ident.value.clone(),
                other => other.to_string(),
            })
            .collect();
        match values.len() {
            3 => TableRef {
                catalog: Some(values[0].clone()),
                schema: Some(values[1].clone()),
                name: values[2].clone(),
            },
            2 => TableRef {
                catalog: None,
                schema: Some(values[0].clone()),
                name: values[1].clone(),
            },
            _ => TableRef {
                catalog: None,
                schema: None,
                name: values.last().cloned().unwrap_or_default(),
            },
        }
    }
}

/// CREATE TABLE AS with an explicit column list, waiting for the cursor to
/// resolve the inner query's column names with a synchronous DESCRIBE.
#[derive(Debug, Clone)]
pub struct CtasPlan {
    /// `CREATE [OR REPLACE] TABLE <name>` prefix, rendered
    pub create_prefix: String,
    /// Declared (name, type) pairs, types already coerced to host types
    pub columns: Vec<(String, String)>,
    /// The inner query, rendered
    pub query_sql: String,
}

/// Side annotations a transform attaches to an executed statement.
#[derive(Debug, Clone, Default)]
pub struct Tags {
    /// Replaces the rendered statement entirely
    pub override_sql: Option<String>,
    /// CREATE DATABASE succeeded → materialise the per-database catalog
    pub create_db_name: Option<String>,
    /// Captured `COMMENT = '...'` property for the catalog
    pub table_comment: Option<(TableRef, String)>,
    /// Captured VARCHAR lengths for the catalog
    pub text_lengths: Vec<(String, i64)>,
    /// Table the text lengths belong to
    pub text_lengths_table: Option<TableRef>,
    /// RANDOM(seed) → `setseed` value to run before the SELECT
    pub seed: Option<String>,
    /// CTAS realignment pending a DESCRIBE of the inner query
    pub ctas: Option<CtasPlan>,
    /// Statement contains a lowered FLATTEN
    pub flattened: bool,
}

/// One host-bound statement produced by the pipeline.
#[derive(Debug, Clone)]
pub struct HostStatement {
    pub sql: String,
    pub tags: Tags,
}

impl HostStatement {
    pub fn plain(sql: impl Into<String>) -> Self {
        HostStatement {
            sql: sql.into(),
            tags: Tags::default(),
        }
    }
}

/// A single pipeline step.
pub type TransformFn = fn(&mut Statement, &TransformContext, &mut Tags) -> SqlResult<()>;

/// The ordered pipeline. Precedence notes:
/// `semi_structured` runs TRIM/extract-cast interplay internally (bottom-up),
/// `coerce_types` runs after the decimal shims so their generated
/// DECIMAL(38,0) casts collapse to BIGINT, and `information_schema_fs` runs
/// before the other table-binding transforms.
pub const PIPELINE: &[(&str, TransformFn)] = &[
    ("create_database", ddl::create_database),
    ("drop_database", ddl::drop_database),
    ("drop_schema_cascade", ddl::drop_schema_cascade),
    ("create_clone", ddl::create_clone),
    ("information_schema_fs", relations::information_schema_fs),
    ("identifier_table", relations::identifier_table),
    ("flatten", relations::flatten),
    ("values_columns", relations::values_columns),
    ("semi_structured", semi::semi_structured),
    ("function_shims", funcs::function_shims),
    ("coerce_types", types::coerce_types),
    ("extract_text_length", types::extract_text_length),
    ("create_table_as", ddl::create_table_as),
];

/// Translate one parsed target-dialect statement into host statements.
///
/// `table_comment` is the `COMMENT = '...'` property captured from the raw
/// SQL before parsing, if any.
pub fn transform_statement(
    statement: Statement,
    ctx: &TransformContext,
    table_comment: Option<String>,
) -> SqlResult<Vec<HostStatement>> {
    let mut statement = statement;
    ident::upper_case_unquoted_identifiers(&mut statement);

    if matches!(statement, Statement::Merge { .. }) {
        return merge::plan(&statement);
    }

    let exploded = ddl::explode(statement)?;
    let mut host = Vec::with_capacity(exploded.len());
    for (i, stmt) in exploded.into_iter().enumerate() {
        let comment = if i == 0 { table_comment.clone() } else { None };
        host.push(apply_pipeline(stmt, ctx, comment)?);
    }
    Ok(host)
}

fn apply_pipeline(
    mut statement: Statement,
    ctx: &TransformContext,
    table_comment: Option<String>,
) -> SqlResult<HostStatement> {
    let mut tags = Tags::default();

    if let Some(comment) = table_comment {
        if let Some(table) = created_table_ref(&statement) {
            tags.table_comment = Some((table, comment));
        }
    }

    for (name, transform) in PIPELINE {
        log::trace!("applying transform {name}");
        transform(&mut statement, ctx, &mut tags)?;
        if tags.override_sql.is_some() {
            break;
        }
    }

    let sql = match &tags.override_sql {
        Some(sql) => sql.clone(),
        None => host_sql_fixups(statement.to_string()),
    };
    Ok(HostStatement { sql, tags })
}

fn created_table_ref(statement: &Statement) -> Option<TableRef> {
    match statement {
        Statement::CreateTable(create) => Some(TableRef::from_object_name(&create.name)),
        Statement::CreateView { name, .. } => Some(TableRef::from_object_name(name)),
        _ => None,
    }
}

/// Method-less percent sampling in rendered SQL.
static SAMPLE_PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)TABLESAMPLE \((\d+(?:\.\d+)?)\)").expect("valid regex literal")
});

/// Row sampling in rendered SQL.
static SAMPLE_ROWS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TABLESAMPLE \((\d+) ROWS\)").expect("valid regex literal"));

/// Rendered-SQL fixups for constructs whose rendered form the host reads
/// differently from the target: method-less sampling defaults to BERNOULLI
/// percent sampling, row sampling to RESERVOIR.
pub fn host_sql_fixups(sql: String) -> String {
    if !sql.to_uppercase().contains("TABLESAMPLE") {
        return sql;
    }
    let sql = SAMPLE_ROWS_RE
        .replace_all(&sql, "TABLESAMPLE RESERVOIR($1 ROWS)")
        .into_owned();
    SAMPLE_PERCENT_RE
        .replace_all(&sql, "TABLESAMPLE BERNOULLI($1 PERCENT)")
        .into_owned()
}

/// The NOP success statement every modifier without host-side effect runs.
pub const SUCCESS_NOP: &str = "SELECT 'Statement executed successfully.' AS status";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;

    pub(crate) fn transform_one(sql: &str) -> HostStatement {
        let stmt = SqlParser::snowflake().parse_single(sql).unwrap();
        let ctx = TransformContext::default();
        transform_statement(stmt, &ctx, None)
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn test_passthrough_select() {
        let host = transform_one("select 1");
        assert_eq!(host.sql, "SELECT 1");
    }

    #[test]
    fn test_sample_fixup() {
        assert_eq!(
            host_sql_fixups("SELECT * FROM T1 TABLESAMPLE (50)".to_string()),
            "SELECT * FROM T1 TABLESAMPLE BERNOULLI(50 PERCENT)"
        );
        assert_eq!(
            host_sql_fixups("SELECT * FROM T1 TABLESAMPLE (5 ROWS)".to_string()),
            "SELECT * FROM T1 TABLESAMPLE RESERVOIR(5 ROWS)"
        );
    }

    #[test]
    fn test_table_ref_parts() {
        let stmt = SqlParser::snowflake()
            .parse_single("create table db1.s1.t1 (x int)")
            .unwrap();
        match stmt {
            sqlparser::ast::Statement::CreateTable(ct) => {
                let r = TableRef::from_object_name(&ct.name);
                assert_eq!(r.catalog.as_deref(), Some("db1"));
                assert_eq!(r.schema.as_deref(), Some("s1"));
                assert_eq!(r.name, "t1");
            }
            other => panic!("unexpected: {other}"),
        }
    }
}
