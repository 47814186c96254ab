//! SHOW family rewrites.
//!
//! Each SHOW target rewrites to a SELECT over the host's information schema
//! or the metadata catalog, producing the warehouse's exact column names and
//! order. Targets are dispatched through a small handler table keyed by the
//! SHOW keyword.

use regex::Regex;
use std::sync::LazyLock;

use super::TransformContext;
use crate::error::{SqlError, SqlResult};
use crate::ident::IdentPart;

/// Scope clause of a SHOW statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShowScope {
    #[default]
    All,
    Account,
    Database(Option<String>),
    Schema(Option<(Option<String>, String)>),
    Table(Vec<IdentPart>),
}

/// A parsed SHOW statement.
#[derive(Debug, Clone)]
pub struct ShowRequest {
    pub kind: String,
    pub terse: bool,
    pub scope: ShowScope,
    pub like: Option<String>,
    pub limit: Option<String>,
}

struct Regexes {
    main: Regex,
    like: Regex,
    scope: Regex,
    limit: Regex,
}

/// The SHOW statement grammar, compiled once.
static REGEXES: LazyLock<Regexes> = LazyLock::new(|| Regexes {
    main: Regex::new(
        r"(?is)^SHOW\s+(?P<terse>TERSE\s+)?(?P<kind>PRIMARY\s+KEYS|UNIQUE\s+KEYS|IMPORTED\s+KEYS|\w+)(?P<rest>.*)$",
    )
    .expect("valid regex literal"),
    like: Regex::new(r"(?i)\bLIKE\s+'(?P<p>[^']*)'").expect("valid regex literal"),
    scope: Regex::new(
        r#"(?i)\bIN\s+(?:(?P<kw>ACCOUNT|DATABASE|SCHEMA|TABLE|VIEW)\b)?\s*(?P<obj>(?:"[^"]+"|[\w$])+(?:\.(?:"[^"]+"|[\w$])+)*)?"#,
    )
    .expect("valid regex literal"),
    limit: Regex::new(r"(?i)\bLIMIT\s+(?P<n>\d+)").expect("valid regex literal"),
});

/// Recognise and rewrite a SHOW statement; `None` when `sql` is not SHOW.
pub fn parse_show(sql: &str, ctx: &TransformContext) -> SqlResult<Option<String>> {
    let re = &*REGEXES;
    let Some(caps) = re.main.captures(sql.trim().trim_end_matches(';')) else {
        return Ok(None);
    };

    let kind = caps["kind"].to_uppercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let rest = &caps["rest"];

    let scope = match re.scope.captures(rest) {
        None => ShowScope::All,
        Some(scope_caps) => {
            let obj = scope_caps.name("obj").map(|m| m.as_str().to_string());
            match scope_caps
                .name("kw")
                .map(|m| m.as_str().to_uppercase())
                .as_deref()
            {
                Some("ACCOUNT") => ShowScope::Account,
                Some("DATABASE") => {
                    ShowScope::Database(obj.map(|o| IdentPart::parse(&o).value))
                }
                Some("SCHEMA") => ShowScope::Schema(obj.map(|o| {
                    let parts: Vec<IdentPart> = crate::command::split_object_parts(&o)
                        .iter()
                        .map(|p| IdentPart::parse(p))
                        .collect();
                    match parts.as_slice() {
                        [db, schema] => (Some(db.value.clone()), schema.value.clone()),
                        [schema] => (None, schema.value.clone()),
                        _ => (None, o.to_uppercase()),
                    }
                })),
                Some("TABLE") | Some("VIEW") => ShowScope::Table(
                    obj.map(|o| {
                        crate::command::split_object_parts(&o)
                            .iter()
                            .map(|p| IdentPart::parse(p))
                            .collect()
                    })
                    .unwrap_or_default(),
                ),
                None => match obj {
                    // `IN db1.schema1` and `IN db1` without a keyword
                    Some(o) => {
                        let parts: Vec<IdentPart> = crate::command::split_object_parts(&o)
                            .iter()
                            .map(|p| IdentPart::parse(p))
                            .collect();
                        match parts.as_slice() {
                            [db, schema] => {
                                ShowScope::Schema(Some((Some(db.value.clone()), schema.value.clone())))
                            }
                            [schema] => ShowScope::Schema(Some((None, schema.value.clone()))),
                            _ => ShowScope::All,
                        }
                    }
                    None => ShowScope::All,
                },
            }
        }
    };

    let request = ShowRequest {
        kind: kind.clone(),
        terse: caps.name("terse").is_some(),
        scope,
        like: re.like.captures(rest).map(|c| c["p"].to_string()),
        limit: re.limit.captures(rest).map(|c| c["n"].to_string()),
    };

    let sql = match kind.as_str() {
        "DATABASES" => show_databases(),
        "SCHEMAS" => show_schemas(&request, ctx),
        "OBJECTS" | "TABLES" => show_objects_tables(&request, ctx),
        "VIEWS" => show_views(&request, ctx),
        "COLUMNS" => show_columns(&request, ctx),
        "USERS" => show_users(),
        "STAGES" => show_stages(&request, ctx),
        "FUNCTIONS" => show_functions(),
        "PROCEDURES" => show_procedures(),
        "WAREHOUSES" => show_warehouses(),
        "PRIMARY KEYS" => show_keys(&request, ctx, "PRIMARY"),
        "UNIQUE KEYS" => show_keys(&request, ctx, "UNIQUE"),
        "IMPORTED KEYS" => show_keys(&request, ctx, "FOREIGN"),
        other => {
            return Err(SqlError::Unsupported(format!("SHOW {other}")));
        }
    };
    Ok(Some(sql))
}

/// Catalog and schema a scope resolves to, falling back to the session.
fn scope_catalog_schema(
    request: &ShowRequest,
    ctx: &TransformContext,
) -> (Option<String>, Option<String>) {
    match &request.scope {
        ShowScope::Account => (None, None),
        ShowScope::All => (ctx.database.map(str::to_string), None),
        ShowScope::Database(db) => (
            db.clone().or_else(|| ctx.database.map(str::to_string)),
            None,
        ),
        ShowScope::Schema(Some((db, schema))) => (
            db.clone().or_else(|| ctx.database.map(str::to_string)),
            Some(schema.clone()),
        ),
        ShowScope::Schema(None) => (
            ctx.database.map(str::to_string),
            ctx.schema.map(str::to_string),
        ),
        ShowScope::Table(parts) => match parts.as_slice() {
            [db, schema, _] => (Some(db.value.clone()), Some(schema.value.clone())),
            [schema, _] => (
                ctx.database.map(str::to_string),
                Some(schema.value.clone()),
            ),
            _ => (
                ctx.database.map(str::to_string),
                ctx.schema.map(str::to_string),
            ),
        },
    }
}

fn show_databases() -> String {
    "SELECT \
        to_timestamp(0)::timestamptz as 'created_on', \
        database_name as 'name', \
        'N' as 'is_default', \
        'N' as 'is_current', \
        '' as 'origin', \
        'SYSADMIN' as 'owner', \
        NULL as 'comment', \
        '' as 'options', \
        1 as 'retention_time', \
        'STANDARD' as 'kind', \
        NULL as 'budget', \
        'ROLE' as 'owner_role_type', \
        NULL as 'object_visibility' \
     FROM duckdb_databases \
     WHERE database_name NOT IN ('memory', 'system', 'temp', '_fs_global')"
        .to_string()
}

fn show_schemas(request: &ShowRequest, ctx: &TransformContext) -> String {
    let base = "select \
        to_timestamp(0)::timestamptz as 'created_on', \
        case \
            when schema_name = '_fs_information_schema' then 'information_schema' \
            else schema_name \
        end as 'name', \
        NULL as 'kind', \
        catalog_name as 'database_name', \
        NULL as 'schema_name' \
     from information_schema.schemata \
     where not catalog_name in ('memory', 'system', 'temp', '_fs_global') \
       and not schema_name in ('main', 'pg_catalog')";

    let database = match &request.scope {
        ShowScope::Database(Some(db)) => Some(db.clone()),
        _ => ctx.database.map(str::to_string),
    };
    match database {
        Some(db) => format!("{base} and catalog_name = '{db}'"),
        None => base.to_string(),
    }
}

fn show_objects_tables(request: &ShowRequest, ctx: &TransformContext) -> String {
    // unscoped SHOW OBJECTS/TABLES lists the whole "account"
    let (catalog, schema) = match &request.scope {
        ShowScope::All => (None, None),
        _ => scope_catalog_schema(request, ctx),
    };
    let show_tables = request.kind == "TABLES";

    let mut columns = vec![
        "to_timestamp(0)::timestamptz as 'created_on'".to_string(),
        "table_name as 'name'".to_string(),
        "case when table_type='BASE TABLE' then 'TABLE' else table_type end as 'kind'".to_string(),
        "table_catalog as 'database_name'".to_string(),
        "table_schema as 'schema_name'".to_string(),
    ];
    if !request.terse {
        columns.extend(
            [
                "'' as 'comment'",
                "'' as 'cluster_by'",
                "0 as 'rows'",
                "0 as 'bytes'",
                "'SYSADMIN' as 'owner'",
                "1 as 'retention_time'",
            ]
            .map(String::from),
        );
        if show_tables {
            columns.extend(
                [
                    "'OFF' as 'automatic_clustering'",
                    "'OFF' as 'change_tracking'",
                    "'OFF' as 'search_optimization'",
                    "null as 'search_optimization_progress'",
                    "null as 'search_optimization_bytes'",
                    "'N' as 'is_external'",
                    "'N' as 'enable_schema_evolution'",
                    "'ROLE' as 'owner_role_type'",
                    "'N' as 'is_event'",
                    "null as 'budget'",
                    "'N' as 'is_hybrid'",
                    "'N' as 'is_iceberg'",
                    "'N' as 'is_dynamic'",
                    "'N' as 'is_immutable'",
                ]
                .map(String::from),
            );
        } else {
            columns.extend(
                [
                    "'ROLE' as 'owner_role_type'",
                    "null as 'budget'",
                    "'N' as 'is_hybrid'",
                    "'N' as 'is_dynamic'",
                ]
                .map(String::from),
            );
        }
    }

    let mut where_clauses = vec!["not (table_schema == '_fs_information_schema')".to_string()];
    if show_tables {
        where_clauses.push("table_type = 'BASE TABLE'".to_string());
    }
    if let Some(catalog) = catalog {
        where_clauses.push(format!("table_catalog = '{catalog}'"));
    }
    if let Some(schema) = schema {
        where_clauses.push(format!("table_schema = '{schema}'"));
    }
    if let Some(like) = &request.like {
        where_clauses.push(format!("table_name ilike '{like}'"));
    }

    let limit = request
        .limit
        .as_ref()
        .map(|n| format!(" LIMIT {n}"))
        .unwrap_or_default();

    format!(
        "SELECT {} from information_schema.tables where {}{limit}",
        columns.join(", "),
        where_clauses.join(" AND ")
    )
}

fn show_views(request: &ShowRequest, ctx: &TransformContext) -> String {
    let (catalog, schema) = match &request.scope {
        ShowScope::All => (None, None),
        _ => scope_catalog_schema(request, ctx),
    };

    let mut where_clauses = vec![
        "not table_schema in ('_fs_information_schema', 'information_schema', 'pg_catalog')"
            .to_string(),
    ];
    if let Some(catalog) = catalog {
        where_clauses.push(format!("table_catalog = '{catalog}'"));
    }
    if let Some(schema) = schema {
        where_clauses.push(format!("table_schema = '{schema}'"));
    }
    if let Some(like) = &request.like {
        where_clauses.push(format!("table_name ilike '{like}'"));
    }

    format!(
        "SELECT \
            to_timestamp(0)::timestamptz as 'created_on', \
            table_name as 'name', \
            '' as 'reserved', \
            table_catalog as 'database_name', \
            table_schema as 'schema_name', \
            'SYSADMIN' as 'owner', \
            '' as 'comment', \
            coalesce(view_definition, '') as 'text', \
            'false' as 'is_secure', \
            'false' as 'is_materialized', \
            'ROLE' as 'owner_role_type', \
            'OFF' as 'change_tracking' \
         from information_schema.views where {}",
        where_clauses.join(" AND ")
    )
}

fn show_columns(request: &ShowRequest, ctx: &TransformContext) -> String {
    let (catalog, schema) = scope_catalog_schema(request, ctx);
    let table = match &request.scope {
        ShowScope::Table(parts) => parts.last().map(|p| p.value.clone()),
        _ => None,
    };

    let columns_view = match &catalog {
        Some(catalog) => format!("{catalog}._fs_information_schema._fs_columns"),
        None => "_fs_information_schema._fs_columns".to_string(),
    };

    let mut where_clauses = vec!["1=1".to_string()];
    if let Some(catalog) = catalog {
        where_clauses.push(format!("table_catalog = '{catalog}'"));
    }
    if let Some(schema) = schema {
        where_clauses.push(format!("table_schema = '{schema}'"));
    }
    if let Some(table) = table {
        where_clauses.push(format!("table_name = '{table}'"));
    }

    format!(
        "SELECT \
            table_name, \
            table_schema as \"schema_name\", \
            column_name, \
            CASE \
                WHEN data_type = 'NUMBER' THEN '{{\"type\":\"FIXED\",\"precision\":'|| numeric_precision || ',\"scale\":' || numeric_scale || ',\"nullable\":true}}' \
                WHEN data_type = 'TEXT' THEN '{{\"type\":\"TEXT\",\"length\":' || coalesce(character_maximum_length,16777216)  || ',\"byteLength\":' || CASE WHEN character_maximum_length = 16777216 THEN 16777216 ELSE coalesce(character_maximum_length*4,16777216) END  || ',\"nullable\":true,\"fixed\":false}}' \
                WHEN data_type in ('TIMESTAMP_NTZ','TIMESTAMP_TZ','TIME') THEN '{{\"type\":\"' || data_type || '\",\"precision\":0,\"scale\":9,\"nullable\":true}}' \
                WHEN data_type = 'FLOAT' THEN '{{\"type\":\"REAL\",\"nullable\":true}}' \
                WHEN data_type = 'BINARY' THEN '{{\"type\":\"BINARY\",\"length\":8388608,\"byteLength\":8388608,\"nullable\":true,\"fixed\":true}}' \
                ELSE '{{\"type\":\"' || data_type || '\",\"nullable\":true}}' \
            END as \"data_type\", \
            CASE WHEN is_nullable = 'YES' THEN 'true' ELSE 'false' END as \"null?\", \
            COALESCE(column_default, '') as \"default\", \
            'COLUMN' as \"kind\", \
            '' as \"expression\", \
            '' as \"comment\", \
            table_catalog as \"database_name\", \
            '' as \"autoincrement\", \
            NULL as \"schema_evolution_record\" \
         FROM {columns_view} \
         WHERE {} \
         ORDER BY table_name, ordinal_position",
        where_clauses.join(" AND ")
    )
}

fn show_users() -> String {
    "SELECT * FROM _fs_global._fs_information_schema._fs_users_ext".to_string()
}

fn show_stages(request: &ShowRequest, ctx: &TransformContext) -> String {
    let mut where_clauses = vec!["1=1".to_string()];
    match &request.scope {
        ShowScope::Account => {}
        scope => {
            let (catalog, schema) = scope_catalog_schema(request, ctx);
            if let Some(catalog) = catalog {
                where_clauses.push(format!("database_name = '{catalog}'"));
            }
            // an unscoped SHOW STAGES lists the current schema only
            let schema = match (scope, schema) {
                (ShowScope::All, None) => ctx.schema.map(str::to_string),
                (ShowScope::All, Some(s)) => Some(s),
                (_, s) => s,
            };
            if let Some(schema) = schema {
                where_clauses.push(format!("schema_name = '{schema}'"));
            }
        }
    }
    if let Some(like) = &request.like {
        where_clauses.push(format!("name ilike '{like}'"));
    }

    format!(
        "SELECT * FROM _fs_global._fs_information_schema._fs_stages \
         WHERE {} ORDER BY database_name, schema_name, name",
        where_clauses.join(" AND ")
    )
}

// returns zero rows
fn show_functions() -> String {
    "SELECT \
        '1970-01-01 00:00:00 UTC'::timestamptz as created_on, \
        'SYSTIMESTAMP' as name, \
        '' as schema_name, \
        'Y' as is_builtin, \
        'N' as is_aggregate, \
        'N' as is_ansi, \
        0 as min_num_arguments, \
        0 as max_num_arguments, \
        'SYSTIMESTAMP() RETURN TIMESTAMP_LTZ' as arguments, \
        'Returns the current timestamp' as description, \
        '' as catalog_name, \
        'N' as is_table_function, \
        'N' as valid_for_clustering, \
        NULL as is_secure, \
        '' as secrets, \
        '' as external_access_integrations, \
        'N' as is_external_function, \
        'SQL' as language, \
        'N' as is_memoizable, \
        'N' as is_data_metric \
     WHERE 0 = 1"
        .to_string()
}

// returns zero rows
fn show_procedures() -> String {
    "SELECT \
        '2012-08-01 07:00:00 UTC'::timestamptz as 'created_on', \
        'SYSTEM$CLASSIFY' as 'name', \
        '' as 'schema_name', \
        'Y' as 'is_builtin', \
        'N' as 'is_aggregate', \
        'N' as 'is_ansi', \
        2 as 'min_num_arguments', \
        2 as 'max_num_arguments', \
        'SYSTEM$CLASSIFY(VARCHAR, OBJECT) RETURN OBJECT' as 'arguments', \
        'classify stored proc' as 'description', \
        '' as 'catalog_name', \
        'N' as 'is_table_function', \
        'N' as 'valid_for_clustering', \
        NULL as 'is_secure', \
        '' as 'secrets', \
        '' as 'external_access_integrations' \
     WHERE 0 = 1"
        .to_string()
}

fn show_warehouses() -> String {
    "SELECT \
        'SNOWMOCK_WAREHOUSE' as name, \
        'STARTED' as state, \
        'STANDARD' as type, \
        'X-Small' as size, \
        1 as min_cluster_count, \
        1 as max_cluster_count, \
        1 as started_clusters, \
        0 as running, \
        0 as queued, \
        'N' as is_default, \
        'N' as is_current, \
        600 as auto_suspend, \
        'true' as auto_resume, \
        ' 100' as available, \
        '0' as provisioning, \
        '0' as quiescing, \
        '0' as other, \
        '1970-01-01 00:00:00.000000 UTC'::timestamptz as created_on, \
        '1970-01-01 00:00:00.000000 UTC'::timestamptz as resumed_on, \
        '1970-01-01 00:00:00.000000 UTC'::timestamptz as updated_on, \
        'SYSADMIN' as owner, \
        '' as comment, \
        'false' as enable_query_acceleration, \
        8 as query_acceleration_max_scale_factor, \
        'null' as resource_monitor, \
        0 as actives, \
        0 as pendings, \
        0 as failed, \
        0 as suspended, \
        '123456789012' as uuid, \
        'STANDARD' as scaling_policy, \
        NULL as budget, \
        'ROLE' as owner_role_type, \
        NULL as resource_constraint"
        .to_string()
}

fn show_keys(request: &ShowRequest, ctx: &TransformContext, kind: &str) -> String {
    let current_database = ctx.database.unwrap_or("");

    let mut statement = if kind == "FOREIGN" {
        format!(
            "SELECT \
                to_timestamp(0)::timestamptz as created_on, \
                '' as pk_database_name, \
                '' as pk_schema_name, \
                '' as pk_table_name, \
                unnest(constraint_column_names) as pk_column_name, \
                database_name as fk_database_name, \
                schema_name as fk_schema_name, \
                table_name as fk_table_name, \
                unnest(constraint_column_names) as fk_column_name, \
                1 as key_sequence, \
                'NO ACTION' as update_rule, \
                'NO ACTION' as delete_rule, \
                LOWER(CONCAT(database_name, '_', schema_name, '_', table_name, '_pkey')) AS fk_name, \
                LOWER(CONCAT(database_name, '_', schema_name, '_', table_name, '_pkey')) AS pk_name, \
                'NOT DEFERRABLE' as deferrability, \
                'false' as rely, \
                null as \"comment\" \
             FROM duckdb_constraints \
             WHERE constraint_type = 'PRIMARY KEY' \
               AND database_name = '{current_database}' \
               AND table_name NOT LIKE '_fs_%' "
        )
    } else {
        format!(
            "SELECT \
                to_timestamp(0)::timestamptz as created_on, \
                database_name as database_name, \
                schema_name as schema_name, \
                table_name as table_name, \
                unnest(constraint_column_names) as column_name, \
                1 as key_sequence, \
                LOWER(CONCAT(database_name, '_', schema_name, '_', table_name, '_pkey')) AS constraint_name, \
                'false' as rely, \
                null as \"comment\" \
             FROM duckdb_constraints \
             WHERE constraint_type = '{kind} KEY' \
               AND database_name = '{current_database}' \
               AND table_name NOT LIKE '_fs_%' "
        )
    };

    match &request.scope {
        ShowScope::Schema(Some((db, schema))) => {
            if let Some(db) = db {
                statement.push_str(&format!("AND database_name = '{db}' "));
            }
            statement.push_str(&format!("AND schema_name = '{schema}' "));
        }
        ShowScope::Table(parts) => {
            if let Some(table) = parts.last() {
                statement.push_str(&format!("AND table_name = '{}' ", table.value));
            }
        }
        _ => {}
    }
    statement
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>() -> TransformContext<'a> {
        TransformContext {
            database: Some("DB1"),
            schema: Some("SCHEMA1"),
            db_path: None,
        }
    }

    #[test]
    fn test_show_databases() {
        let sql = parse_show("SHOW DATABASES", &ctx()).unwrap().unwrap();
        assert!(sql.contains("duckdb_databases"), "{sql}");
        assert!(sql.contains("'STANDARD' as 'kind'"), "{sql}");
    }

    #[test]
    fn test_show_schemas_scoped_to_current_database() {
        let sql = parse_show("SHOW SCHEMAS", &ctx()).unwrap().unwrap();
        assert!(sql.contains("catalog_name = 'DB1'"), "{sql}");
    }

    #[test]
    fn test_show_terse_tables() {
        let sql = parse_show("SHOW TERSE TABLES", &ctx()).unwrap().unwrap();
        assert!(!sql.contains("cluster_by"), "{sql}");
        assert!(sql.contains("table_type = 'BASE TABLE'"), "{sql}");
    }

    #[test]
    fn test_show_objects_in_schema() {
        let sql = parse_show("SHOW OBJECTS IN db2.schema2", &ctx()).unwrap().unwrap();
        assert!(sql.contains("table_catalog = 'DB2'"), "{sql}");
        assert!(sql.contains("table_schema = 'SCHEMA2'"), "{sql}");
    }

    #[test]
    fn test_show_stages_account_scope() {
        let sql = parse_show("SHOW STAGES IN ACCOUNT", &ctx()).unwrap().unwrap();
        assert!(!sql.contains("database_name = "), "{sql}");
        assert!(sql.contains("_fs_stages"), "{sql}");
    }

    #[test]
    fn test_show_stages_default_scope() {
        let sql = parse_show("SHOW STAGES", &ctx()).unwrap().unwrap();
        assert!(sql.contains("database_name = 'DB1'"), "{sql}");
        assert!(sql.contains("schema_name = 'SCHEMA1'"), "{sql}");
    }

    #[test]
    fn test_show_primary_keys() {
        let sql = parse_show("SHOW PRIMARY KEYS", &ctx()).unwrap().unwrap();
        assert!(sql.contains("duckdb_constraints"), "{sql}");
        assert!(sql.contains("'PRIMARY KEY'"), "{sql}");
    }

    #[test]
    fn test_show_columns_in_table() {
        let sql = parse_show("SHOW COLUMNS IN TABLE t1", &ctx()).unwrap().unwrap();
        assert!(sql.contains("table_name = 'T1'"), "{sql}");
        assert!(sql.contains("_fs_columns"), "{sql}");
    }

    #[test]
    fn test_not_show() {
        assert!(parse_show("SELECT 1", &ctx()).unwrap().is_none());
    }
}
