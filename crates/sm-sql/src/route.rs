//! Pre-parse statement routing.
//!
//! Session variables are inlined before parsing (the target dialect allows
//! `$var` where the parser would reject it), and several statement families
//! are recognised on the raw SQL because the general parser does not model
//! them faithfully: SET/UNSET, USE, SHOW, DESCRIBE TABLE/VIEW, the stage and
//! file commands, COPY INTO, CREATE USER, COMMENT properties, and the
//! tag/policy statements that no-op. Everything else parses with the
//! Snowflake dialect and flows through the transform pipeline.

use regex::Regex;
use std::sync::LazyLock;

use sqlparser::ast::Statement;

use crate::command::key_command;
use crate::error::SqlResult;
use crate::ident::IdentPart;
use crate::parser::SqlParser;
use crate::transforms::copy_into::{parse_copy_into, CopyInto};
use crate::transforms::describe::parse_describe;
use crate::transforms::show::parse_show;
use crate::transforms::stage::{parse_stage_command, StageCommand};
use crate::transforms::TransformContext;

/// Target of a USE statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseTarget {
    Database(String),
    Schema {
        database: Option<String>,
        schema: String,
    },
    /// USE WAREHOUSE / USE ROLE — accepted, no host effect
    Noop,
}

/// Where a statement goes after routing.
#[derive(Debug)]
pub enum Routed {
    /// `SET name = value`
    SetVariable { name: String, value: String },
    /// `UNSET name`
    UnsetVariable { name: String },
    Use(UseTarget),
    /// A generated host query (SHOW / DESCRIBE)
    Query { sql: String },
    Stage(StageCommand),
    CopyInto(Box<CopyInto>),
    CreateUser { name: String },
    /// Captured table comment with no other host effect
    TableComment {
        table: Vec<IdentPart>,
        comment: String,
    },
    /// Statement acknowledged with a success status and no host effect
    Nop,
    /// General path: parsed statements plus a captured COMMENT property
    Parsed {
        statements: Vec<Statement>,
        table_comment: Option<String>,
    },
}

struct Regexes {
    set: Regex,
    unset: Regex,
    use_stmt: Regex,
    create_user: Regex,
    comment_on_table: Regex,
    alter_set_comment: Regex,
    comment_property: Regex,
    nops: Vec<Regex>,
}

/// The statement families recognised before the general parse, compiled once.
static REGEXES: LazyLock<Regexes> = LazyLock::new(|| Regexes {
    set: Regex::new(r"(?is)^SET\s+(?P<name>[A-Za-z_][\w$]*)\s*=\s*(?P<value>.+?)\s*$")
        .expect("valid regex literal"),
    unset: Regex::new(r"(?i)^UNSET\s+(?P<name>[A-Za-z_][\w$]*)\s*$").expect("valid regex literal"),
    use_stmt: Regex::new(
        r#"(?is)^USE\s+(?:(?P<kind>DATABASE|SCHEMA|WAREHOUSE|ROLE)\s+)?(?P<name>(?:"[^"]+"|[\w$])+(?:\.(?:"[^"]+"|[\w$])+)*)\s*$"#,
    )
    .expect("valid regex literal"),
    create_user: Regex::new(
        r#"(?is)^CREATE\s+USER\s+(?:IF\s+NOT\s+EXISTS\s+)?(?P<name>"[^"]+"|[\w$]+)\s*(?P<rest>.*)$"#,
    )
    .expect("valid regex literal"),
    comment_on_table: Regex::new(
        r#"(?is)^COMMENT\s+(?:IF\s+EXISTS\s+)?ON\s+TABLE\s+(?P<name>\S+)\s+IS\s+'(?P<c>(?:[^']|'')*)'\s*$"#,
    )
    .expect("valid regex literal"),
    alter_set_comment: Regex::new(
        r#"(?is)^ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?P<name>\S+)\s+SET\s+COMMENT\s*=\s*'(?P<c>(?:[^']|'')*)'\s*$"#,
    )
    .expect("valid regex literal"),
    comment_property: Regex::new(r"(?i)\s+COMMENT\s*=\s*'(?P<c>(?:[^']|'')*)'")
        .expect("valid regex literal"),
    nops: [
        r"(?is)^CREATE\s+(OR\s+REPLACE\s+)?TAG\b",
        r"(?is)^DROP\s+TAG\b",
        r"(?is)^ALTER\s+TABLE\s+.*\b(SET|UNSET)\s+TAG\b",
        r"(?is)^ALTER\s+TABLE\s+.*\b(MASKING\s+POLICY|ROW\s+ACCESS\s+POLICY)\b",
        r"(?is)^CREATE\s+(OR\s+REPLACE\s+)?(MASKING\s+POLICY|ROW\s+ACCESS\s+POLICY)\b",
        r"(?is)^DROP\s+(MASKING\s+POLICY|ROW\s+ACCESS\s+POLICY)\b",
        r"(?is)^ALTER\s+TABLE\s+\S+\s+CLUSTER\s+BY\b",
        r"(?is)^ALTER\s+SESSION\b",
        r"(?is)^COMMENT\s+(IF\s+EXISTS\s+)?ON\s+COLUMN\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex literal"))
    .collect(),
});

/// Route one raw statement.
pub fn route(sql: &str, ctx: &TransformContext) -> SqlResult<Routed> {
    let re = &*REGEXES;
    let trimmed = sql.trim().trim_end_matches(';').trim();

    if let Some(caps) = re.set.captures(trimmed) {
        return Ok(Routed::SetVariable {
            name: caps["name"].to_uppercase(),
            value: caps["value"].to_string(),
        });
    }
    if let Some(caps) = re.unset.captures(trimmed) {
        return Ok(Routed::UnsetVariable {
            name: caps["name"].to_uppercase(),
        });
    }

    if let Some(caps) = re.use_stmt.captures(trimmed) {
        let kind = caps
            .name("kind")
            .map(|k| k.as_str().to_uppercase())
            .unwrap_or_else(|| "DATABASE".to_string());
        let name = &caps["name"];
        return Ok(Routed::Use(match kind.as_str() {
            "WAREHOUSE" | "ROLE" => UseTarget::Noop,
            "SCHEMA" => {
                let parts: Vec<IdentPart> = crate::command::split_object_parts(name)
                    .iter()
                    .map(|p| IdentPart::parse(p))
                    .collect();
                match parts.as_slice() {
                    [db, schema] => UseTarget::Schema {
                        database: Some(db.value.clone()),
                        schema: schema.value.clone(),
                    },
                    [schema] => UseTarget::Schema {
                        database: None,
                        schema: schema.value.clone(),
                    },
                    _ => UseTarget::Noop,
                }
            }
            _ => UseTarget::Database(IdentPart::parse(name).value),
        }));
    }

    for nop in &re.nops {
        if nop.is_match(trimmed) {
            return Ok(Routed::Nop);
        }
    }

    if let Some(show_sql) = parse_show(trimmed, ctx)? {
        return Ok(Routed::Query { sql: show_sql });
    }
    if let Some(describe_sql) = parse_describe(trimmed, ctx)? {
        return Ok(Routed::Query { sql: describe_sql });
    }
    if let Some(stage_cmd) = parse_stage_command(trimmed)? {
        return Ok(Routed::Stage(stage_cmd));
    }
    if let Some(copy) = parse_copy_into(trimmed)? {
        return Ok(Routed::CopyInto(Box::new(copy)));
    }

    if let Some(caps) = re.create_user.captures(trimmed) {
        if caps["rest"].trim().is_empty() {
            return Ok(Routed::CreateUser {
                name: IdentPart::parse(&caps["name"]).value,
            });
        }
        return Err(crate::error::SqlError::Unsupported(
            "CREATE USER with options".to_string(),
        ));
    }

    if let Some(caps) = re.comment_on_table.captures(trimmed) {
        return Ok(Routed::TableComment {
            table: crate::command::split_object_parts(&caps["name"])
                .iter()
                .map(|p| IdentPart::parse(p))
                .collect(),
            comment: caps["c"].replace("''", "'"),
        });
    }
    if let Some(caps) = re.alter_set_comment.captures(trimmed) {
        return Ok(Routed::TableComment {
            table: crate::command::split_object_parts(&caps["name"])
                .iter()
                .map(|p| IdentPart::parse(p))
                .collect(),
            comment: caps["c"].replace("''", "'"),
        });
    }

    // COMMENT = '...' properties are captured here; the host statement
    // carries no comment syntax
    let cmd = key_command(trimmed);
    let (to_parse, table_comment) = if matches!(
        cmd.as_str(),
        "CREATE TABLE" | "CREATE VIEW" | "CREATE SCHEMA"
    ) {
        match re.comment_property.captures(trimmed) {
            Some(caps) => {
                let comment = caps["c"].replace("''", "'");
                let stripped = re.comment_property.replace(trimmed, "").into_owned();
                let tagged = matches!(cmd.as_str(), "CREATE TABLE" | "CREATE VIEW");
                (stripped, tagged.then_some(comment))
            }
            None => (trimmed.to_string(), None),
        }
    } else {
        (trimmed.to_string(), None)
    };

    let statements = SqlParser::snowflake().parse(&to_parse)?;
    Ok(Routed::Parsed {
        statements,
        table_comment,
    })
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
    fn test_route_set_variable() {
        match route("SET var1 = 'hello'", &ctx()).unwrap() {
            Routed::SetVariable { name, value } => {
                assert_eq!(name, "VAR1");
                assert_eq!(value, "'hello'");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_route_unset() {
        match route("UNSET var1", &ctx()).unwrap() {
            Routed::UnsetVariable { name } => assert_eq!(name, "VAR1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_route_use_database() {
        match route("USE DATABASE db2", &ctx()).unwrap() {
            Routed::Use(UseTarget::Database(db)) => assert_eq!(db, "DB2"),
            other => panic!("unexpected {other:?}"),
        }
        match route("USE db2", &ctx()).unwrap() {
            Routed::Use(UseTarget::Database(db)) => assert_eq!(db, "DB2"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_route_use_schema_qualified() {
        match route("USE SCHEMA db2.s2", &ctx()).unwrap() {
            Routed::Use(UseTarget::Schema { database, schema }) => {
                assert_eq!(database.as_deref(), Some("DB2"));
                assert_eq!(schema, "S2");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_route_show() {
        assert!(matches!(
            route("SHOW DATABASES", &ctx()).unwrap(),
            Routed::Query { .. }
        ));
    }

    #[test]
    fn test_route_stage() {
        assert!(matches!(
            route("CREATE STAGE st1", &ctx()).unwrap(),
            Routed::Stage(StageCommand::Create(_))
        ));
    }

    #[test]
    fn test_route_tag_nop() {
        assert!(matches!(
            route("ALTER TABLE t1 SET TAG foo='bar'", &ctx()).unwrap(),
            Routed::Nop
        ));
        assert!(matches!(
            route("CREATE TAG cost_center", &ctx()).unwrap(),
            Routed::Nop
        ));
    }

    #[test]
    fn test_route_create_user() {
        match route("CREATE USER jim", &ctx()).unwrap() {
            Routed::CreateUser { name } => assert_eq!(name, "JIM"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_route_comment_property_stripped() {
        match route("CREATE TABLE t1 (x INT) COMMENT = 'the table'", &ctx()).unwrap() {
            Routed::Parsed {
                statements,
                table_comment,
            } => {
                assert_eq!(statements.len(), 1);
                assert_eq!(table_comment.as_deref(), Some("the table"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_route_comment_on_table() {
        match route("COMMENT ON TABLE t1 IS 'hello'", &ctx()).unwrap() {
            Routed::TableComment { table, comment } => {
                assert_eq!(table[0].value, "T1");
                assert_eq!(comment, "hello");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_route_parsed_select() {
        assert!(matches!(
            route("SELECT 1", &ctx()).unwrap(),
            Routed::Parsed { .. }
        ));
    }

    #[test]
    fn test_route_copy_into() {
        assert!(matches!(
            route("COPY INTO t1 FROM 's3://bucket/'", &ctx()).unwrap(),
            Routed::CopyInto(_)
        ));
    }
}
