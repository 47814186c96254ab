//! Table-binding transforms: information-schema redirects, IDENTIFIER()
//! resolution, FLATTEN lowering, and VALUES column naming.

use sqlparser::ast::{
    visit_relations_mut, FunctionArg, Ident, ObjectName, ObjectNamePart, SetExpr, Statement,
    TableAlias, TableAliasColumnDef, TableFactor,
};
use std::ops::ControlFlow;

use super::walk::rewrite_table_factors;
use super::{Tags, TransformContext};
use crate::command::split_object_parts;
use crate::error::SqlResult;
use crate::parser::parse_query;

fn part(value: &str) -> ObjectNamePart {
    ObjectNamePart::Identifier(Ident::new(value))
}

fn part_value(p: &ObjectNamePart) -> String {
    match p {
        ObjectNamePart::Identifier(ident) => ident.value.to_uppercase(),
        other => other.to_string().to_uppercase(),
    }
}

const REDIRECTED: [&str; 4] = ["COLUMNS", "TABLES", "VIEWS", "LOAD_HISTORY"];

/// Redirect `INFORMATION_SCHEMA.{COLUMNS,TABLES,VIEWS,LOAD_HISTORY}` to the
/// `_FS_*` views carrying target-faithful content, and
/// `INFORMATION_SCHEMA.DATABASES` to the global catalog.
///
/// Must run before the other table-binding transforms.
pub fn information_schema_fs(
    statement: &mut Statement,
    ctx: &TransformContext,
    _tags: &mut Tags,
) -> SqlResult<()> {
    let schema_is_reserved = ctx
        .schema
        .map(|s| {
            s.eq_ignore_ascii_case("INFORMATION_SCHEMA")
                || s.eq_ignore_ascii_case("_FS_INFORMATION_SCHEMA")
        })
        .unwrap_or(false);

    let _ = visit_relations_mut(statement, |name: &mut ObjectName| {
        let values: Vec<String> = name.0.iter().map(part_value).collect();
        let n = values.len();

        if n >= 2 && values[n - 2] == "INFORMATION_SCHEMA" {
            let object = values[n - 1].as_str();
            if object == "DATABASES" {
                name.0 = vec![part("_fs_global"), part("_fs_information_schema"), part("databases")];
            } else if REDIRECTED.contains(&object) {
                let mut parts = Vec::with_capacity(3);
                if n == 3 {
                    parts.push(name.0[0].clone());
                }
                parts.push(part("_FS_INFORMATION_SCHEMA"));
                parts.push(part(&format!("_FS_{object}")));
                name.0 = parts;
            }
        } else if n == 1 && schema_is_reserved {
            let object = values[0].as_str();
            if object == "DATABASES" {
                name.0 = vec![part("_fs_global"), part("_fs_information_schema"), part("databases")];
            } else if REDIRECTED.contains(&object) {
                name.0 = vec![part("_FS_INFORMATION_SCHEMA"), part(&format!("_FS_{object}"))];
            }
        }
        ControlFlow::<()>::Continue(())
    });
    Ok(())
}

/// `IDENTIFIER('name')` in table position becomes the named table
/// (three-part names supported).
pub fn identifier_table(
    statement: &mut Statement,
    _ctx: &TransformContext,
    _tags: &mut Tags,
) -> SqlResult<()> {
    rewrite_table_factors(statement, |factor| {
        if let TableFactor::Table { name, args, .. } = factor {
            let is_identifier =
                name.0.len() == 1 && part_value(&name.0[0]) == "IDENTIFIER" && args.is_some();
            if !is_identifier {
                return Ok(());
            }
            let literal = args
                .as_ref()
                .and_then(|a| a.args.first())
                .map(|a| a.to_string())
                .unwrap_or_default();
            let literal = literal.trim().trim_matches('\'');

            let parts: Vec<ObjectNamePart> = split_object_parts(literal)
                .into_iter()
                .map(|p| {
                    if p.starts_with('"') && p.ends_with('"') && p.len() >= 2 {
                        ObjectNamePart::Identifier(Ident::with_quote('"', &p[1..p.len() - 1]))
                    } else {
                        part(&p.to_uppercase())
                    }
                })
                .collect();
            if !parts.is_empty() {
                name.0 = parts;
                *args = None;
            }
        }
        Ok(())
    })
}

/// Lower `LATERAL FLATTEN(...)` and `TABLE(FLATTEN(...))` to the catalog's
/// `_fs_flatten` table macro, which yields SEQ, KEY, PATH, INDEX, VALUE, THIS.
pub fn flatten(
    statement: &mut Statement,
    _ctx: &TransformContext,
    tags: &mut Tags,
) -> SqlResult<()> {
    let mut flattened = false;

    rewrite_table_factors(statement, |factor| {
        let (input, lateral, alias) = match factor {
            TableFactor::Function {
                lateral,
                name,
                args,
                alias,
                ..
            } if name.to_string().eq_ignore_ascii_case("flatten") => {
                (flatten_input(args), *lateral, alias.clone())
            }
            TableFactor::TableFunction { expr, alias, .. } => {
                if let sqlparser::ast::Expr::Function(f) = expr {
                    if f.name.to_string().eq_ignore_ascii_case("flatten") {
                        (
                            super::semi::rendered_args(f)
                                .first()
                                .map(|a| strip_named_arg(a)),
                            false,
                            alias.clone(),
                        )
                    } else {
                        return Ok(());
                    }
                } else {
                    return Ok(());
                }
            }
            _ => return Ok(()),
        };

        let Some(input) = input else { return Ok(()) };
        let subquery = parse_query(&format!("SELECT * FROM _fs_flatten({input})"))?;
        *factor = TableFactor::Derived {
            lateral,
            subquery: Box::new(subquery),
            alias,
        };
        flattened = true;
        Ok(())
    })?;

    if flattened {
        tags.flattened = true;
    }
    Ok(())
}

fn flatten_input(args: &[FunctionArg]) -> Option<String> {
    args.first().map(|a| strip_named_arg(&a.to_string()))
}

/// `input => x` → `x`
fn strip_named_arg(rendered: &str) -> String {
    match rendered.split_once("=>") {
        Some((_, value)) => value.trim().to_string(),
        None => rendered.trim().to_string(),
    }
}

/// Attach `COLUMN1..COLUMNn` aliases to anonymous VALUES so the target's
/// column naming convention applies.
pub fn values_columns(
    statement: &mut Statement,
    _ctx: &TransformContext,
    _tags: &mut Tags,
) -> SqlResult<()> {
    rewrite_table_factors(statement, |factor| {
        if let TableFactor::Derived {
            subquery,
            alias: alias @ None,
            ..
        } = factor
        {
            if let SetExpr::Values(values) = subquery.body.as_ref() {
                let width = values.rows.first().map(|r| r.len()).unwrap_or(0);
                if width > 0 {
                    *alias = Some(TableAlias {
                        name: Ident::new("_"),
                        columns: (1..=width)
                            .map(|i| TableAliasColumnDef {
                                name: Ident::new(format!("COLUMN{i}")),
                                data_type: None,
                            })
                            .collect(),
                    });
                }
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use crate::transforms::tests::transform_one;

    #[test]
    fn test_information_schema_columns_redirect() {
        let host = transform_one("SELECT * FROM INFORMATION_SCHEMA.COLUMNS");
        assert!(
            host.sql.contains("_FS_INFORMATION_SCHEMA._FS_COLUMNS"),
            "{}",
            host.sql
        );
    }

    #[test]
    fn test_information_schema_databases_redirect() {
        let host = transform_one("SELECT * FROM INFORMATION_SCHEMA.DATABASES");
        assert!(
            host.sql.contains("_fs_global._fs_information_schema.databases"),
            "{}",
            host.sql
        );
    }

    #[test]
    fn test_three_part_redirect_keeps_catalog() {
        let host = transform_one("SELECT * FROM DB1.INFORMATION_SCHEMA.TABLES");
        assert!(
            host.sql.contains("DB1._FS_INFORMATION_SCHEMA._FS_TABLES"),
            "{}",
            host.sql
        );
    }

    #[test]
    fn test_identifier_table() {
        let host = transform_one("SELECT * FROM IDENTIFIER('db1.sch.t1')");
        assert_eq!(host.sql, "SELECT * FROM DB1.SCH.T1");
    }

    #[test]
    fn test_identifier_table_quoted() {
        let host = transform_one("SELECT * FROM IDENTIFIER('\"t lower\"')");
        assert_eq!(host.sql, "SELECT * FROM \"t lower\"");
    }

    #[test]
    fn test_values_columns() {
        let host = transform_one("SELECT * FROM (VALUES (1, 2), (3, 4))");
        assert!(host.sql.contains("AS _ (COLUMN1, COLUMN2)"), "{}", host.sql);
    }

    #[test]
    fn test_lateral_flatten() {
        let host = transform_one("SELECT F.VALUE FROM T1, LATERAL FLATTEN(INPUT => T1.J) F");
        assert!(host.sql.contains("_fs_flatten(T1.J)"), "{}", host.sql);
    }
}
