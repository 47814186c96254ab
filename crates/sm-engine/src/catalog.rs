//! Metadata catalog DDL.
//!
//! A side-schema per user database (`_fs_information_schema`) plus a
//! process-global `_fs_global` database hold the extensions the host engine
//! lacks: table comments, declared text lengths, stages, load history,
//! users, and dialect-faithful views over the host's information schema.

/// The process-global database name.
pub const GLOBAL_DATABASE: &str = "_fs_global";

/// The reserved information-schema name substituted for the user-visible one.
pub const RESERVED_SCHEMA: &str = "_fs_information_schema";

/// Statements run once per process to materialise the global catalog, in
/// dependency order.
const GLOBAL_CREATION_STMTS: &[&str] = &[
    "ATTACH IF NOT EXISTS ':memory:' AS _fs_global",
    "CREATE SCHEMA IF NOT EXISTS _fs_global._fs_information_schema",
    "CREATE TABLE IF NOT EXISTS _fs_global._fs_information_schema._fs_users_ext (
    name varchar,
    created_on timestamptz,
    login_name varchar,
    display_name varchar,
    first_name varchar,
    last_name varchar,
    email varchar,
    mins_to_unlock varchar,
    days_to_expiry varchar,
    comment varchar,
    disabled varchar,
    must_change_password varchar,
    snowflake_lock varchar,
    default_warehouse varchar,
    default_namespace varchar,
    default_role varchar,
    default_secondary_roles varchar,
    ext_authn_duo varchar,
    ext_authn_uid varchar,
    mins_to_bypass_mfa varchar,
    owner varchar,
    last_success_login timestamptz,
    expires_at_time timestamptz,
    locked_until_time timestamptz,
    has_password varchar,
    has_rsa_public_key varchar,
    PRIMARY KEY (name)
)",
    "CREATE TABLE IF NOT EXISTS _fs_global._fs_information_schema._fs_stages (
    created_on timestamptz,
    name varchar,
    database_name varchar,
    schema_name varchar,
    url varchar,
    has_credentials varchar,
    has_encryption_key varchar,
    owner varchar,
    comment varchar,
    region varchar,
    type varchar,
    cloud varchar,
    notification_channel varchar,
    storage_integration varchar,
    endpoint varchar,
    owner_role_type varchar,
    directory_enabled varchar,
    PRIMARY KEY (database_name, schema_name, name)
)",
    "CREATE OR REPLACE VIEW _fs_global._fs_information_schema.databases AS
SELECT
    database_name,
    'SYSADMIN' AS database_owner,
    'NO' AS is_transient,
    NULL::varchar AS comment,
    to_timestamp(0)::timestamptz AS created,
    to_timestamp(0)::timestamptz AS last_altered,
    1 AS retention_time,
    'STANDARD' AS type
FROM duckdb_databases
WHERE database_name NOT IN ('memory', 'system', 'temp', '_fs_global')",
];

/// Statements run on first attach of a user database, in dependency order.
///
/// `{catalog}` is substituted with the database name before execution;
/// identifiers cannot be bound as statement parameters. `ext` column
/// prefixes disambiguate the extension tables when they join with the
/// host's information schema.
const PER_DB_CREATION_STMTS: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS {catalog}._fs_information_schema",
    "CREATE TABLE IF NOT EXISTS {catalog}._fs_information_schema.tables_ext (
    ext_table_catalog varchar,
    ext_table_schema varchar,
    ext_table_name varchar,
    comment varchar,
    PRIMARY KEY (ext_table_catalog, ext_table_schema, ext_table_name)
)",
    "CREATE TABLE IF NOT EXISTS {catalog}._fs_information_schema.columns_ext (
    ext_table_catalog varchar,
    ext_table_schema varchar,
    ext_table_name varchar,
    ext_column_name varchar,
    ext_character_maximum_length integer,
    ext_character_octet_length integer,
    PRIMARY KEY (ext_table_catalog, ext_table_schema, ext_table_name, ext_column_name)
)",
    "CREATE TABLE IF NOT EXISTS {catalog}._fs_information_schema._fs_load_history (
    schema_name varchar,
    file_name varchar,
    table_name varchar,
    last_load_time timestamptz,
    status varchar,
    row_count bigint,
    row_parsed bigint,
    first_error_message varchar,
    first_error_line_number integer,
    first_error_character_position integer,
    first_error_col_name varchar,
    error_count integer,
    error_limit integer
)",
    "CREATE OR REPLACE VIEW {catalog}._fs_information_schema._fs_columns AS
SELECT
    table_catalog, table_schema, table_name, column_name, ordinal_position, column_default, is_nullable,
    case when starts_with(data_type, 'DECIMAL') or data_type in ('BIGINT', 'INTEGER', 'HUGEINT', 'UBIGINT') then 'NUMBER'
         when data_type = 'VARCHAR' then 'TEXT'
         when data_type = 'DOUBLE' then 'FLOAT'
         when data_type = 'BLOB' then 'BINARY'
         when data_type = 'JSON' then 'VARIANT'
         when data_type = 'TIMESTAMP' or data_type = 'TIMESTAMP_NS' then 'TIMESTAMP_NTZ'
         when data_type = 'TIMESTAMP WITH TIME ZONE' then 'TIMESTAMP_TZ'
         else data_type end as data_type,
    ext_character_maximum_length as character_maximum_length,
    ext_character_octet_length as character_octet_length,
    case when data_type in ('BIGINT', 'INTEGER') then 38
         when data_type = 'DOUBLE' then NULL
         else numeric_precision end as numeric_precision,
    case when data_type in ('BIGINT', 'INTEGER') then 10
         when data_type = 'DOUBLE' then NULL
         else numeric_precision_radix end as numeric_precision_radix,
    case when data_type = 'DOUBLE' then NULL else numeric_scale end as numeric_scale,
    collation_name, is_identity, identity_generation, identity_cycle
FROM {catalog}.information_schema.columns
LEFT JOIN {catalog}._fs_information_schema.columns_ext ext
  ON ext_table_catalog = table_catalog
 AND ext_table_schema = table_schema
 AND ext_table_name = table_name
 AND ext_column_name = column_name
WHERE table_schema != '_fs_information_schema'",
    "CREATE OR REPLACE VIEW {catalog}._fs_information_schema._fs_tables AS
SELECT t.*, ext.comment AS comment
FROM {catalog}.information_schema.tables t
LEFT JOIN {catalog}._fs_information_schema.tables_ext ext
  ON ext.ext_table_catalog = t.table_catalog
 AND ext.ext_table_schema = t.table_schema
 AND ext.ext_table_name = t.table_name
WHERE t.table_schema != '_fs_information_schema'",
    "CREATE OR REPLACE VIEW {catalog}._fs_information_schema._fs_views AS
SELECT
    table_catalog,
    table_schema,
    table_name,
    'SYSADMIN' AS table_owner,
    view_definition,
    'NONE' AS check_option,
    'NO' AS is_updatable,
    'NO' AS insertable_into,
    'NO' AS is_secure,
    to_timestamp(0)::timestamptz AS created,
    to_timestamp(0)::timestamptz AS last_altered,
    to_timestamp(0)::timestamptz AS last_ddl,
    'SYSADMIN' AS last_ddl_by,
    NULL::varchar AS comment
FROM {catalog}.information_schema.views
WHERE table_schema != '_fs_information_schema'",
];

/// The global-catalog statements as one batch.
pub fn global_creation_sql() -> String {
    GLOBAL_CREATION_STMTS.join(";\n")
}

/// The per-database catalog statements as one batch.
pub fn per_db_creation_sql(catalog: &str) -> String {
    PER_DB_CREATION_STMTS
        .iter()
        .map(|stmt| stmt.replace("{catalog}", catalog))
        .collect::<Vec<_>>()
        .join(";\n")
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Upsert a table comment captured by the transform pipeline.
pub fn insert_table_comment_sql(catalog: &str, schema: &str, table: &str, comment: &str) -> String {
    format!(
        "INSERT INTO {catalog}.{RESERVED_SCHEMA}.tables_ext \
         VALUES ('{catalog}', '{schema}', '{}', '{}') \
         ON CONFLICT (ext_table_catalog, ext_table_schema, ext_table_name) \
         DO UPDATE SET comment = excluded.comment",
        escape(table),
        escape(comment)
    )
}

/// Upsert declared text lengths captured by the transform pipeline.
pub fn insert_text_lengths_sql(
    catalog: &str,
    schema: &str,
    table: &str,
    text_lengths: &[(String, i64)],
) -> String {
    let values: Vec<String> = text_lengths
        .iter()
        .map(|(column, size)| {
            let octet = (size * 4).min(16_777_216);
            format!(
                "('{catalog}', '{schema}', '{}', '{}', {size}, {octet})",
                escape(table),
                escape(column)
            )
        })
        .collect();

    format!(
        "INSERT INTO {catalog}.{RESERVED_SCHEMA}.columns_ext \
         VALUES {} \
         ON CONFLICT (ext_table_catalog, ext_table_schema, ext_table_name, ext_column_name) \
         DO UPDATE SET ext_character_maximum_length = excluded.ext_character_maximum_length, \
             ext_character_octet_length = excluded.ext_character_octet_length",
        values.join(", ")
    )
}

/// Record a user for SHOW USERS.
pub fn insert_user_sql(name: &str) -> String {
    format!(
        "INSERT INTO {GLOBAL_DATABASE}.{RESERVED_SCHEMA}._fs_users_ext (name, created_on) \
         VALUES ('{}', now()) ON CONFLICT (name) DO NOTHING",
        escape(name)
    )
}
