//! DESCRIBE TABLE/VIEW rewrites.
//!
//! Produces the warehouse's fixed 12-column projection over the catalog's
//! `_fs_columns` view. Describing an object inside the reserved
//! information-schema falls back to the host's own DESCRIBE, shaped to the
//! same columns.

use regex::Regex;
use std::sync::LazyLock;

use super::TransformContext;
use crate::error::SqlResult;
use crate::ident::IdentPart;

/// DESCRIBE TABLE/VIEW with an optional qualified name.
static DESCRIBE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^(?:DESC|DESCRIBE)\s+(?:TABLE\s+|VIEW\s+)?(?P<name>(?:"[^"]+"|[\w$]+)(?:\.(?:"[^"]+"|[\w$]+)){0,2})\s*$"#,
    )
    .expect("valid regex literal")
});

/// Recognise and rewrite DESCRIBE TABLE/VIEW; `None` when `sql` is not one.
pub fn parse_describe(sql: &str, ctx: &TransformContext) -> SqlResult<Option<String>> {
    let Some(caps) = DESCRIBE_RE.captures(sql.trim().trim_end_matches(';')) else {
        return Ok(None);
    };

    let parts: Vec<IdentPart> = crate::command::split_object_parts(&caps["name"])
        .iter()
        .map(|p| IdentPart::parse(p))
        .collect();

    let (catalog, schema, table) = match parts.as_slice() {
        [db, schema, table] => (
            Some(db.value.clone()),
            Some(schema.value.clone()),
            table.value.clone(),
        ),
        [schema, table] => (
            ctx.database.map(str::to_string),
            Some(schema.value.clone()),
            table.value.clone(),
        ),
        [table] => (
            ctx.database.map(str::to_string),
            ctx.schema.map(str::to_string),
            table.value.clone(),
        ),
        _ => return Ok(None),
    };

    let reserved = schema
        .as_deref()
        .map(|s| {
            s.eq_ignore_ascii_case("_FS_INFORMATION_SCHEMA")
                || s.eq_ignore_ascii_case("INFORMATION_SCHEMA")
        })
        .unwrap_or(false);

    if reserved {
        let object = table.to_uppercase();
        let view = if ["COLUMNS", "TABLES", "VIEWS", "LOAD_HISTORY"].contains(&object.as_str()) {
            format!("_FS_{object}")
        } else {
            object
        };
        return Ok(Some(describe_info_schema_sql(&view)));
    }

    let Some(catalog) = catalog else {
        return Err(crate::error::SqlError::MissingDatabase {
            command: "DESCRIBE TABLE".to_string(),
        });
    };
    let Some(schema) = schema else {
        return Err(crate::error::SqlError::MissingSchema {
            command: "DESCRIBE TABLE".to_string(),
        });
    };

    Ok(Some(describe_table_sql(&catalog, &schema, &table)))
}

/// The 12-column DESCRIBE projection over the catalog.
pub fn describe_table_sql(catalog: &str, schema: &str, table: &str) -> String {
    format!(
        "SELECT \
            column_name AS \"name\", \
            CASE WHEN data_type = 'NUMBER' THEN 'NUMBER(' || numeric_precision || ',' || numeric_scale || ')' \
                 WHEN data_type = 'TEXT' THEN 'VARCHAR(' || coalesce(character_maximum_length,16777216)  || ')' \
                 WHEN data_type = 'TIMESTAMP_NTZ' THEN 'TIMESTAMP_NTZ(9)' \
                 WHEN data_type = 'TIMESTAMP_TZ' THEN 'TIMESTAMP_TZ(9)' \
                 WHEN data_type = 'TIME' THEN 'TIME(9)' \
                 WHEN data_type = 'BINARY' THEN 'BINARY(8388608)' \
                ELSE data_type END AS \"type\", \
            'COLUMN' AS \"kind\", \
            CASE WHEN is_nullable = 'YES' THEN 'Y' ELSE 'N' END AS \"null?\", \
            column_default AS \"default\", \
            'N' AS \"primary key\", \
            'N' AS \"unique key\", \
            NULL::VARCHAR AS \"check\", \
            NULL::VARCHAR AS \"expression\", \
            NULL::VARCHAR AS \"comment\", \
            NULL::VARCHAR AS \"policy name\", \
            NULL::JSON AS \"privacy domain\" \
         FROM {catalog}._fs_information_schema._fs_columns \
         WHERE table_catalog = '{catalog}' AND table_schema = '{schema}' AND table_name = '{table}' \
         ORDER BY ordinal_position"
    )
}

/// Describing one of the reserved schema's own views uses the host DESCRIBE.
fn describe_info_schema_sql(view: &str) -> String {
    format!(
        "SELECT \
            column_name AS \"name\", \
            column_type as \"type\", \
            'COLUMN' AS \"kind\", \
            CASE WHEN \"null\" = 'YES' THEN 'Y' ELSE 'N' END AS \"null?\", \
            NULL::VARCHAR AS \"default\", \
            'N' AS \"primary key\", \
            'N' AS \"unique key\", \
            NULL::VARCHAR AS \"check\", \
            NULL::VARCHAR AS \"expression\", \
            NULL::VARCHAR AS \"comment\", \
            NULL::VARCHAR AS \"policy name\", \
            NULL::JSON AS \"privacy domain\" \
         FROM (DESCRIBE _fs_information_schema.{view})"
    )
}
