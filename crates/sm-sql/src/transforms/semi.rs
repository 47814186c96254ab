//! Semi-structured value handling.
//!
//! Snowflake OBJECT/ARRAY/VARIANT values live in the host engine as JSON.
//! Path access lowers to `json_extract`; casting an extracted value to
//! VARCHAR switches to `json_extract_string` so the raw string comes back
//! without JSON quoting.

use sqlparser::ast::{
    Expr, Function, Ident, JsonPath, JsonPathElem, ObjectName, ObjectNamePart, Statement,
    Subscript,
};

use super::walk::rewrite_exprs;
use super::{Tags, TransformContext};
use crate::error::SqlResult;
use crate::parser::parse_expr;

pub(crate) fn function_name(function: &Function) -> String {
    function.name.to_string().to_uppercase()
}

/// Rendered argument list of a function call, in order.
pub(crate) fn rendered_args(function: &Function) -> Vec<String> {
    match &function.args {
        sqlparser::ast::FunctionArguments::List(list) => {
            list.args.iter().map(|a| a.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

pub(crate) fn is_function_named(expr: &Expr, name: &str) -> bool {
    matches!(expr, Expr::Function(f) if function_name(f) == name)
}

fn rename_function(expr: &mut Expr, name: &str) {
    if let Expr::Function(f) = expr {
        f.name = ObjectName(vec![ObjectNamePart::Identifier(Ident::new(name))]);
    }
}

/// Render a parsed JSON path as the host's path syntax (`$.a[0]."b c"`).
fn json_path_string(path: &JsonPath) -> String {
    let mut out = String::from("$");
    for elem in &path.path {
        match elem {
            JsonPathElem::Dot { key, .. } => {
                if key.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    out.push('.');
                    out.push_str(key);
                } else {
                    out.push_str(&format!(".\"{key}\""));
                }
            }
            JsonPathElem::Bracket { key } => {
                out.push_str(&format!("[{key}]"));
            }
        }
    }
    out
}

fn is_varchar_type(data_type: &sqlparser::ast::DataType) -> bool {
    let compact = data_type.to_string().to_uppercase();
    compact.starts_with("VARCHAR") || compact.starts_with("TEXT") || compact.starts_with("STRING")
}

/// Convert an expression that will be consumed as a string: extraction calls
/// flip to their raw-string form instead of gaining a cast.
pub(crate) fn cast_to_varchar(expr: &Expr) -> SqlResult<Expr> {
    if is_function_named(expr, "JSON_EXTRACT") {
        let mut raw = expr.clone();
        rename_function(&mut raw, "json_extract_string");
        Ok(raw)
    } else {
        parse_expr(&format!("CAST({expr} AS TEXT)"))
    }
}

/// One bottom-up pass over expressions covering the semi-structured shims.
pub fn semi_structured(
    statement: &mut Statement,
    _ctx: &TransformContext,
    tags: &mut Tags,
) -> SqlResult<()> {
    let flattened = tags.flattened;

    rewrite_exprs(statement, |expr| {
        // path access: value:a.b, value['k'], value[0]
        if let Expr::JsonAccess { value, path, .. } = expr {
            let path_str = json_path_string(path);
            *expr = parse_expr(&format!("json_extract({value}, '{path_str}')"))?;
            return Ok(());
        }

        if let Expr::Subscript {
            expr: inner,
            subscript,
            ..
        } = expr
        {
            if let Subscript::Index { index } = subscript.as_ref() {
                let rendered = index.to_string();
                let path = if rendered.starts_with('\'') {
                    format!("$.{}", rendered.trim_matches('\''))
                } else if rendered.chars().all(|c| c.is_ascii_digit()) {
                    format!("$[{rendered}]")
                } else {
                    return Ok(());
                };
                *expr = parse_expr(&format!("json_extract({inner}, '{path}')"))?;
                return Ok(());
            }
        }

        if let Expr::Function(function) = expr {
            match function_name(function).as_str() {
                "PARSE_JSON" | "TO_VARIANT" => {
                    let args = rendered_args(function);
                    if args.len() == 1 {
                        *expr = parse_expr(&format!("json({})", args[0]))?;
                    }
                    return Ok(());
                }
                "TRY_PARSE_JSON" => {
                    let args = rendered_args(function);
                    if args.len() == 1 {
                        *expr = parse_expr(&format!("TRY_CAST({} AS JSON)", args[0]))?;
                    }
                    return Ok(());
                }
                name @ ("OBJECT_CONSTRUCT" | "OBJECT_CONSTRUCT_KEEP_NULL") => {
                    let args = rendered_args(function);
                    let keep_null = name == "OBJECT_CONSTRUCT_KEEP_NULL";
                    let mut pairs: Vec<String> = Vec::new();
                    for chunk in args.chunks(2) {
                        if chunk.len() != 2 {
                            return Ok(()); // OBJECT_CONSTRUCT(*) and friends pass through
                        }
                        let null_valued = chunk.iter().any(|a| a.to_uppercase() == "NULL");
                        if keep_null || !null_valued {
                            pairs.extend_from_slice(chunk);
                        }
                    }
                    *expr = parse_expr(&format!("json_object({})", pairs.join(", ")))?;
                    return Ok(());
                }
                "UPPER" | "LOWER" => {
                    // case conversion of a variant yields its raw string
                    if let sqlparser::ast::FunctionArguments::List(list) = &mut function.args {
                        for arg in &mut list.args {
                            if let sqlparser::ast::FunctionArg::Unnamed(
                                sqlparser::ast::FunctionArgExpr::Expr(e),
                            ) = arg
                            {
                                if is_function_named(e, "JSON_EXTRACT") {
                                    rename_function(e, "json_extract_string");
                                }
                            }
                        }
                    }
                    return Ok(());
                }
                _ => {}
            }
        }

        // casting an extraction (or a FLATTEN VALUE column) to varchar
        // returns the raw string
        if let Expr::Cast {
            expr: inner,
            data_type,
            ..
        } = expr
        {
            if is_varchar_type(data_type) {
                if is_function_named(inner, "JSON_EXTRACT") {
                    rename_function(inner, "json_extract_string");
                } else if flattened && is_value_column(inner) {
                    let replacement = parse_expr(&format!("json_extract_string({inner}, '$')"))?;
                    *expr = replacement;
                }
            }
        }

        Ok(())
    })
}

fn is_value_column(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(ident) => ident.value.eq_ignore_ascii_case("value"),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|p| p.value.eq_ignore_ascii_case("value"))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::transforms::tests::transform_one;

    #[test]
    fn test_json_access_lowered() {
        let host = transform_one("SELECT PARSE_JSON('{\"fruit\":\"banana\"}'):fruit");
        assert!(
            host.sql.contains("json_extract(json('{\"fruit\":\"banana\"}'), '$.fruit')"),
            "{}",
            host.sql
        );
    }

    #[test]
    fn test_json_access_cast_varchar_raw_string() {
        let host = transform_one("SELECT PARSE_JSON('{\"fruit\":\"banana\"}'):fruit::VARCHAR");
        assert!(host.sql.contains("json_extract_string"), "{}", host.sql);
    }

    #[test]
    fn test_try_parse_json() {
        let host = transform_one("SELECT TRY_PARSE_JSON('{invalid: ,]')");
        assert!(host.sql.contains("TRY_CAST('{invalid: ,]' AS JSON)"), "{}", host.sql);
    }

    #[test]
    fn test_object_construct_elides_null() {
        let host = transform_one("SELECT OBJECT_CONSTRUCT('a', 1, 'b', NULL)");
        assert!(host.sql.contains("json_object('a', 1)"), "{}", host.sql);
    }

    #[test]
    fn test_object_construct_keep_null() {
        let host = transform_one("SELECT OBJECT_CONSTRUCT_KEEP_NULL('a', 1, 'b', NULL)");
        assert!(host.sql.contains("json_object('a', 1, 'b', NULL)"), "{}", host.sql);
    }

    #[test]
    fn test_upper_of_extract() {
        let host = transform_one("SELECT UPPER(V:name) FROM T1");
        assert!(host.sql.contains("UPPER(json_extract_string(V, '$.name'))"), "{}", host.sql);
    }
}
