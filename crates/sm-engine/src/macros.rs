//! Host-engine macros created per user database.

/// `EQUAL_NULL(a, b)` — null-safe equality.
fn equal_null_sql(catalog: &str) -> String {
    format!("CREATE MACRO IF NOT EXISTS {catalog}.equal_null(a, b) AS a IS NOT DISTINCT FROM b;")
}

/// The FLATTEN table macro.
///
/// Yields the six warehouse columns. Arrays produce one row per element with
/// INDEX set and a `[i]` PATH; objects produce one row per key with KEY set
/// and the key as PATH.
fn fs_flatten_sql(catalog: &str) -> String {
    format!(
        r#"CREATE OR REPLACE MACRO {catalog}._fs_flatten(input) AS TABLE
SELECT * FROM (
    SELECT
        1::BIGINT AS "SEQ",
        NULL::VARCHAR AS "KEY",
        '[' || (GENERATE_SUBSCRIPTS(CAST(TO_JSON(input) AS JSON[]), 1) - 1) || ']' AS "PATH",
        (GENERATE_SUBSCRIPTS(CAST(TO_JSON(input) AS JSON[]), 1) - 1)::BIGINT AS "INDEX",
        UNNEST(CAST(TO_JSON(input) AS JSON[])) AS "VALUE",
        TO_JSON(input) AS "THIS"
    WHERE json_type(TO_JSON(input)) = 'ARRAY'
    UNION ALL
    SELECT
        1::BIGINT AS "SEQ",
        k AS "KEY",
        k AS "PATH",
        NULL::BIGINT AS "INDEX",
        json_extract(TO_JSON(input), '$."' || k || '"') AS "VALUE",
        TO_JSON(input) AS "THIS"
    FROM UNNEST(json_keys(TO_JSON(input))) AS t(k)
    WHERE json_type(TO_JSON(input)) = 'OBJECT'
);"#
    )
}

/// All macros for one user database.
pub fn creation_sql(catalog: &str) -> String {
    format!("{}\n{}", equal_null_sql(catalog), fs_flatten_sql(catalog))
}
