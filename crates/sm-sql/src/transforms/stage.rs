//! Stage statement parsing: CREATE/DROP STAGE and the PUT/LIST/GET file
//! commands, none of which the general parser models faithfully.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{SqlError, SqlResult};
use crate::ident::IdentPart;

/// A parsed CREATE STAGE.
#[derive(Debug, Clone)]
pub struct StageDef {
    /// Raw (possibly qualified) stage name token
    pub name: String,
    pub or_replace: bool,
    pub temporary: bool,
    pub if_not_exists: bool,
    /// External URL; empty for internal stages
    pub url: String,
}

/// A stage file command.
#[derive(Debug, Clone)]
pub enum StageCommand {
    Create(StageDef),
    Drop {
        name: String,
        if_exists: bool,
    },
    /// Upload a local file into a stage
    Put {
        src_url: String,
        stage: String,
    },
    /// List the files in a stage
    List {
        stage: String,
    },
    /// Download stage files to a local directory
    Get {
        stage: String,
        dest_url: String,
    },
}

struct Regexes {
    create: Regex,
    url: Regex,
    drop: Regex,
    put: Regex,
    list: Regex,
    get: Regex,
}

/// The stage statement grammar, compiled once.
static REGEXES: LazyLock<Regexes> = LazyLock::new(|| Regexes {
    create: Regex::new(
        r#"(?is)^CREATE\s+(?P<or>OR\s+REPLACE\s+)?(?P<temp>TEMP(?:ORARY)?\s+)?STAGE\s+(?P<ine>IF\s+NOT\s+EXISTS\s+)?(?P<name>(?:"[^"]+"|[\w$]+)(?:\.(?:"[^"]+"|[\w$]+)){0,2})(?P<rest>.*)$"#,
    )
    .expect("valid regex literal"),
    url: Regex::new(r"(?i)\bURL\s*=\s*'(?P<u>[^']*)'").expect("valid regex literal"),
    drop: Regex::new(
        r#"(?is)^DROP\s+STAGE\s+(?P<ie>IF\s+EXISTS\s+)?(?P<name>(?:"[^"]+"|[\w$]+)(?:\.(?:"[^"]+"|[\w$]+)){0,2})\s*$"#,
    )
    .expect("valid regex literal"),
    put: Regex::new(r"(?is)^PUT\s+'(?P<url>[^']+)'\s+@(?P<stage>\S+)(?P<rest>.*)$")
        .expect("valid regex literal"),
    list: Regex::new(r"(?is)^(?:LIST|LS)\s+@(?P<stage>\S+)\s*$").expect("valid regex literal"),
    get: Regex::new(r"(?is)^GET\s+@(?P<stage>\S+)\s+'(?P<url>[^']+)'(?P<rest>.*)$")
        .expect("valid regex literal"),
});

/// Recognise a stage statement; `None` when `sql` is none of them.
pub fn parse_stage_command(sql: &str) -> SqlResult<Option<StageCommand>> {
    let re = &*REGEXES;
    let sql = sql.trim().trim_end_matches(';');

    if let Some(caps) = re.create.captures(sql) {
        let rest = &caps["rest"];
        let url = re
            .url
            .captures(rest)
            .map(|c| c["u"].to_string())
            .unwrap_or_default();
        return Ok(Some(StageCommand::Create(StageDef {
            name: caps["name"].to_string(),
            or_replace: caps.name("or").is_some(),
            temporary: caps.name("temp").is_some(),
            if_not_exists: caps.name("ine").is_some(),
            url,
        })));
    }

    if let Some(caps) = re.drop.captures(sql) {
        return Ok(Some(StageCommand::Drop {
            name: caps["name"].to_string(),
            if_exists: caps.name("ie").is_some(),
        }));
    }

    if let Some(caps) = re.put.captures(sql) {
        let url = caps["url"].to_string();
        if !url.starts_with("file://") {
            return Err(SqlError::Compilation(format!(
                "{url} is not a local file URL"
            )));
        }
        return Ok(Some(StageCommand::Put {
            src_url: url,
            stage: caps["stage"].to_string(),
        }));
    }

    if let Some(caps) = re.list.captures(sql) {
        return Ok(Some(StageCommand::List {
            stage: caps["stage"].to_string(),
        }));
    }

    if let Some(caps) = re.get.captures(sql) {
        return Ok(Some(StageCommand::Get {
            stage: caps["stage"].to_string(),
            dest_url: caps["url"].to_string(),
        }));
    }

    Ok(None)
}

/// Resolve a stage reference (`name`, `schema.name`, `db.schema.name`)
/// against the session's current database and schema.
pub fn parts_from_var(
    var: &str,
    current_database: Option<&str>,
    current_schema: Option<&str>,
    command: &str,
) -> SqlResult<(String, String, String)> {
    let parts: Vec<IdentPart> = crate::command::split_object_parts(var)
        .iter()
        .map(|p| IdentPart::parse(p))
        .collect();

    let missing_db = || SqlError::MissingDatabase {
        command: command.to_string(),
    };
    let missing_schema = || SqlError::MissingSchema {
        command: command.to_string(),
    };

    match parts.as_slice() {
        [db, schema, name] => Ok((db.value.clone(), schema.value.clone(), name.value.clone())),
        [schema, name] => {
            let db = current_database.ok_or_else(missing_db)?;
            Ok((db.to_string(), schema.value.clone(), name.value.clone()))
        }
        [name] => {
            let db = current_database.ok_or_else(missing_db)?;
            let schema = current_schema.ok_or_else(missing_schema)?;
            Ok((db.to_string(), schema.to_string(), name.value.clone()))
        }
        _ => Err(SqlError::Compilation(format!("invalid stage name: {var}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_stage() {
        let cmd = parse_stage_command("CREATE STAGE stage1").unwrap().unwrap();
        match cmd {
            StageCommand::Create(def) => {
                assert_eq!(def.name, "stage1");
                assert!(!def.temporary);
                assert!(def.url.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_create_temp_stage_with_url() {
        let cmd = parse_stage_command("CREATE TEMP STAGE db2.schema2.stage2 url='s3://bucket/path/'")
            .unwrap()
            .unwrap();
        match cmd {
            StageCommand::Create(def) => {
                assert_eq!(def.name, "db2.schema2.stage2");
                assert!(def.temporary);
                assert_eq!(def.url, "s3://bucket/path/");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_put() {
        let cmd = parse_stage_command("PUT 'file:///tmp/foo.csv' @st1").unwrap().unwrap();
        match cmd {
            StageCommand::Put { src_url, stage } => {
                assert_eq!(src_url, "file:///tmp/foo.csv");
                assert_eq!(stage, "st1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_list() {
        let cmd = parse_stage_command("LIST @db1.schema1.\"stage5\"").unwrap().unwrap();
        match cmd {
            StageCommand::List { stage } => assert_eq!(stage, "db1.schema1.\"stage5\""),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parts_from_var() {
        let (db, schema, name) =
            parts_from_var("st1", Some("DB1"), Some("SCHEMA1"), "LIST").unwrap();
        assert_eq!((db.as_str(), schema.as_str(), name.as_str()), ("DB1", "SCHEMA1", "ST1"));

        let (db, schema, name) =
            parts_from_var("s2.\"st lower\"", Some("DB1"), None, "LIST").unwrap();
        assert_eq!(
            (db.as_str(), schema.as_str(), name.as_str()),
            ("DB1", "S2", "st lower")
        );
    }

    #[test]
    fn test_parts_from_var_missing_database() {
        let err = parts_from_var("st1", None, None, "CREATE STAGE").unwrap_err();
        assert!(matches!(err, SqlError::MissingDatabase { .. }));
    }

    #[test]
    fn test_not_a_stage_command() {
        assert!(parse_stage_command("SELECT 1").unwrap().is_none());
    }
}
