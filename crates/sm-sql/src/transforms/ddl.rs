//! DDL transforms: database lifecycle, schema cascade, clone, AUTOINCREMENT
//! splitting, multi-column ALTER splitting, and CTAS realignment capture.

use regex::Regex;
use sqlparser::ast::{
    AlterTable, AlterTableOperation, ColumnOption, ColumnOptionDef, ObjectType, Statement,
};
use std::sync::LazyLock;

use super::{CtasPlan, Tags, TransformContext};
use crate::error::SqlResult;
use crate::parser::{parse_expr, SqlParser};

/// CREATE DATABASE becomes a host ATTACH, in-memory or file-backed per the
/// session's configuration. Tagged so the cursor can materialise the
/// per-database catalog on success.
pub fn create_database(
    statement: &mut Statement,
    ctx: &TransformContext,
    tags: &mut Tags,
) -> SqlResult<()> {
    if let Statement::CreateDatabase {
        db_name,
        if_not_exists,
        ..
    } = statement
    {
        let name = super::TableRef::from_object_name(db_name).name;
        let db_file = match ctx.db_path {
            Some(path) => path.join(format!("{name}.db")).display().to_string(),
            None => ":memory:".to_string(),
        };
        let if_not_exists = if *if_not_exists { "IF NOT EXISTS " } else { "" };
        tags.override_sql = Some(format!("ATTACH {if_not_exists}DATABASE '{db_file}' AS {name}"));
        tags.create_db_name = Some(name);
    }
    Ok(())
}

/// The host cannot drop an attached catalog; DETACH it instead.
pub fn drop_database(
    statement: &mut Statement,
    _ctx: &TransformContext,
    tags: &mut Tags,
) -> SqlResult<()> {
    if let Statement::Drop {
        object_type: ObjectType::Database,
        if_exists,
        names,
        ..
    } = statement
    {
        if let Some(name) = names.first() {
            let if_exists = if *if_exists { "IF EXISTS " } else { "" };
            tags.override_sql = Some(format!("DETACH DATABASE {if_exists}{name}"));
        }
    }
    Ok(())
}

/// DROP SCHEMA cascades in the target dialect; the host default is
/// restrictive.
pub fn drop_schema_cascade(
    statement: &mut Statement,
    _ctx: &TransformContext,
    _tags: &mut Tags,
) -> SqlResult<()> {
    if let Statement::Drop {
        object_type: ObjectType::Schema,
        cascade,
        ..
    } = statement
    {
        *cascade = true;
    }
    Ok(())
}

/// CREATE TABLE ... CLONE src → CREATE TABLE ... AS SELECT * FROM src
pub fn create_clone(
    statement: &mut Statement,
    _ctx: &TransformContext,
    tags: &mut Tags,
) -> SqlResult<()> {
    if let Statement::CreateTable(create) = statement {
        if let Some(source) = &create.clone {
            let or_replace = if create.or_replace { "OR REPLACE " } else { "" };
            tags.override_sql = Some(format!(
                "CREATE {or_replace}TABLE {} AS SELECT * FROM {source}",
                create.name
            ));
        }
    }
    Ok(())
}

/// `AUTOINCREMENT(start, increment)` pair form.
static AUTOINCREMENT_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)\s*,\s*(\d+)\)").expect("valid regex literal"));

static AUTOINCREMENT_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)START\s+(?:WITH\s+)?(?:=\s*)?(\d+)").expect("valid regex literal")
});

static AUTOINCREMENT_INCREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)INCREMENT\s+(?:BY\s+)?(?:=\s*)?(\d+)").expect("valid regex literal")
});

fn is_autoincrement(option: &ColumnOptionDef) -> bool {
    let rendered = option.to_string().to_uppercase();
    rendered.contains("AUTOINCREMENT") || rendered.contains("IDENTITY")
}

/// Split statements that map to several host statements:
/// AUTOINCREMENT/IDENTITY columns become CREATE SEQUENCE + CREATE TABLE with
/// a NEXTVAL default, and multi-column ALTER TABLE ADD becomes one ALTER per
/// column (IF NOT EXISTS propagating to all of them).
pub fn explode(statement: Statement) -> SqlResult<Vec<Statement>> {
    match statement {
        Statement::CreateTable(mut create) => {
            let auto_col = create.columns.iter().position(|col| {
                col.options.iter().any(is_autoincrement)
            });
            let Some(col_idx) = auto_col else {
                return Ok(vec![Statement::CreateTable(create)]);
            };

            let column = &create.columns[col_idx];
            let opt_idx = column.options.iter().position(is_autoincrement).unwrap();
            let rendered = column.options[opt_idx].to_string().to_uppercase();

            let (start, increment) = if let Some(caps) = AUTOINCREMENT_PAIR_RE.captures(&rendered)
            {
                (caps[1].to_string(), caps[2].to_string())
            } else {
                (
                    AUTOINCREMENT_START_RE
                        .captures(&rendered)
                        .map(|c| c[1].to_string())
                        .unwrap_or_else(|| "1".to_string()),
                    AUTOINCREMENT_INCREMENT_RE
                        .captures(&rendered)
                        .map(|c| c[1].to_string())
                        .unwrap_or_else(|| "1".to_string()),
                )
            };

            // unique suffix so recreating the table never collides with a
            // sequence the previous incarnation still depends on
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            let table = super::TableRef::from_object_name(&create.name).name.to_lowercase();
            let column_name = column.name.value.to_lowercase();
            let seq_name = format!("_fs_seq_{table}_{column_name}_{}", &suffix[..8]);

            let seq_stmt = SqlParser::snowflake().parse_single(&format!(
                "CREATE SEQUENCE {seq_name} START WITH {start} INCREMENT BY {increment}"
            ))?;

            let column = &mut create.columns[col_idx];
            column.options[opt_idx] = ColumnOptionDef {
                name: None,
                option: ColumnOption::Default(parse_expr(&format!("nextval('{seq_name}')"))?),
            };

            Ok(vec![seq_stmt, Statement::CreateTable(create)])
        }
        Statement::AlterTable(AlterTable {
            ref name,
            if_exists,
            ref operations,
            ..
        }) if operations.len() > 1
            && operations
                .iter()
                .all(|op| matches!(op, AlterTableOperation::AddColumn { .. })) =>
        {
            let propagate_ine = operations.iter().any(|op| {
                matches!(op, AlterTableOperation::AddColumn { if_not_exists: true, .. })
            });

            let mut statements = Vec::with_capacity(operations.len());
            for op in operations {
                if let AlterTableOperation::AddColumn {
                    column_def,
                    if_not_exists,
                    ..
                } = op
                {
                    let ine = if propagate_ine || *if_not_exists {
                        "IF NOT EXISTS "
                    } else {
                        ""
                    };
                    let table_if_exists = if if_exists { "IF EXISTS " } else { "" };
                    statements.push(SqlParser::snowflake().parse_single(&format!(
                        "ALTER TABLE {table_if_exists}{name} ADD COLUMN {ine}{column_def}"
                    ))?);
                }
            }
            Ok(statements)
        }
        other => Ok(vec![other]),
    }
}

/// Capture CREATE TABLE AS with an explicit column list; the cursor resolves
/// the inner query's columns with a DESCRIBE and re-aligns the projection.
pub fn create_table_as(
    statement: &mut Statement,
    _ctx: &TransformContext,
    tags: &mut Tags,
) -> SqlResult<()> {
    if let Statement::CreateTable(create) = statement {
        let (Some(query), false) = (&create.query, create.columns.is_empty()) else {
            return Ok(());
        };
        let or_replace = if create.or_replace { "OR REPLACE " } else { "" };
        let temporary = if create.temporary { "TEMPORARY " } else { "" };
        let if_not_exists = if create.if_not_exists { "IF NOT EXISTS " } else { "" };
        tags.ctas = Some(CtasPlan {
            create_prefix: format!(
                "CREATE {or_replace}{temporary}TABLE {if_not_exists}{}",
                create.name
            ),
            columns: create
                .columns
                .iter()
                .map(|c| (c.name.value.clone(), c.data_type.to_string()))
                .collect(),
            query_sql: query.to_string(),
        });
    }
    Ok(())
}
