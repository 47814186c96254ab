//! Function shims: Snowflake functions the host engine spells differently.

use sqlparser::ast::{
    Expr, Function, FunctionArguments, Query, SetExpr, SelectItem, Statement, VisitMut, VisitorMut,
};
use std::ops::ControlFlow;

use super::semi::{cast_to_varchar, function_name, rendered_args};
use super::walk::rewrite_exprs;
use super::{Tags, TransformContext};
use crate::error::{SqlError, SqlResult};
use crate::parser::parse_expr;

/// Normalise a DATEADD/DATEDIFF unit spelling to the host's part name.
fn normalise_unit(raw: &str) -> String {
    let unit = raw.trim_matches('\'').trim_matches('"').to_uppercase();
    match unit.as_str() {
        "YY" | "YYYY" | "YEARS" => "YEAR".to_string(),
        "QTR" | "QUARTERS" => "QUARTER".to_string(),
        "MM" | "MON" | "MONS" | "MONTHS" => "MONTH".to_string(),
        "WK" | "WEEKS" | "WEEKOFYEAR" => "WEEK".to_string(),
        "DD" | "DAYS" => "DAY".to_string(),
        "HH" | "HOURS" => "HOUR".to_string(),
        "MI" | "MINS" | "MINUTES" => "MINUTE".to_string(),
        "SS" | "SECS" | "SECONDS" => "SECOND".to_string(),
        "MS" | "MILLISECONDS" => "MILLISECOND".to_string(),
        "US" | "MICROSECONDS" => "MICROSECOND".to_string(),
        "NS" | "NANOSECONDS" => "NANOSECOND".to_string(),
        other => other.to_string(),
    }
}

fn is_string_literal(rendered: &str) -> bool {
    rendered.starts_with('\'') && rendered.ends_with('\'')
}

/// Snowflake escapes backslashes inside single-quoted regex constants;
/// the host does not.
fn unescape_regex(pattern: &str) -> String {
    pattern.replace("\\\\", "\\")
}

fn to_decimal(args: &[String], try_cast: bool, name: &str) -> SqlResult<Expr> {
    if args.len() > 1 && is_string_literal(&args[1]) {
        return Err(SqlError::Unsupported(format!("{name} with format argument")));
    }
    let precision = args.get(1).cloned().unwrap_or_else(|| "38".to_string());
    let scale = args.get(2).cloned().unwrap_or_else(|| "0".to_string());
    let cast = if try_cast { "TRY_CAST" } else { "CAST" };
    parse_expr(&format!(
        "{cast}({} AS DECIMAL({precision}, {scale}))",
        args[0]
    ))
}

fn shim_function(function: &Function, seed: &mut Option<String>) -> SqlResult<Option<Expr>> {
    let name = function_name(function);
    let args = rendered_args(function);

    let replacement = match name.as_str() {
        "TO_DATE" if args.len() == 1 => parse_expr(&format!("CAST({} AS DATE)", args[0]))?,
        "TO_TIMESTAMP" | "TO_TIMESTAMP_NTZ" if args.len() == 1 => {
            if is_string_literal(&args[0]) {
                parse_expr(&format!("CAST({} AS TIMESTAMP)", args[0]))?
            } else {
                // seconds since the epoch, surfaced without a time zone
                parse_expr(&format!("CAST(to_timestamp({}) AS TIMESTAMP)", args[0]))?
            }
        }
        "TO_DECIMAL" | "TO_NUMBER" | "TO_NUMERIC" if !args.is_empty() => {
            to_decimal(&args, false, &name)?
        }
        "TRY_TO_DECIMAL" | "TRY_TO_NUMBER" | "TRY_TO_NUMERIC" if !args.is_empty() => {
            to_decimal(&args, true, &name)?
        }
        "TO_VARCHAR" | "TO_CHAR" if args.len() == 1 => {
            parse_expr(&format!("CAST({} AS TEXT)", args[0]))?
        }
        "IFF" if args.len() == 3 => {
            parse_expr(&format!("if({}, {}, {})", args[0], args[1], args[2]))?
        }
        "SPLIT" if args.len() == 2 => {
            // surface a JSON array like the warehouse does
            parse_expr(&format!("to_json(str_split({}, {}))", args[0], args[1]))?
        }
        "ARRAY_SIZE" if args.len() == 1 => parse_expr(&format!(
            "CASE WHEN json_type({}) = 'ARRAY' THEN json_array_length({}) END",
            args[0], args[0]
        ))?,
        "ARRAY_CONSTRUCT" => parse_expr(&format!("json_array({})", args.join(", ")))?,
        "ARRAY_CONSTRUCT_COMPACT" => parse_expr(&format!(
            "to_json(list_filter([{}], x -> x IS NOT NULL))",
            args.join(", ")
        ))?,
        "ARRAY_CAT" if args.len() == 2 => parse_expr(&format!(
            "to_json(list_concat(CAST({} AS JSON[]), CAST({} AS JSON[])))",
            args[0], args[1]
        ))?,
        "ARRAY_AGG" => array_agg(function, &args)?,
        "RANDOM" => {
            if let Some(seed_arg) = args.first() {
                *seed = Some(format!("{seed_arg}/2147483647-0.5"));
            }
            // shift the host's 0..1 double onto the signed 64-bit range
            parse_expr("CAST((random() - 0.5) * 9223372036854775807 AS BIGINT)")?
        }
        "SHA2" if args.len() == 1 || (args.len() == 2 && args[1] == "256") => {
            parse_expr(&format!("sha256({})", args[0]))?
        }
        "SHA2_HEX" if args.len() == 1 || (args.len() == 2 && args[1] == "256") => {
            parse_expr(&format!("sha256({})", args[0]))?
        }
        "SHA2_BINARY" if args.len() == 1 || (args.len() == 2 && args[1] == "256") => {
            parse_expr(&format!("unhex(sha256({}))", args[0]))?
        }
        "DATEADD" if args.len() == 3 => {
            let unit = normalise_unit(&args[0]);
            let mut operand = args[2].clone();
            if is_string_literal(&operand) {
                operand = format!("CAST({operand} AS TIMESTAMP)");
            }
            let sum = format!("({operand} + ({}) * INTERVAL 1 {unit})", args[1]);
            let date_cast = args[2].to_uppercase().ends_with("AS DATE)")
                && matches!(unit.as_str(), "DAY" | "WEEK" | "MONTH" | "YEAR");
            if date_cast {
                parse_expr(&format!("CAST({sum} AS DATE)"))?
            } else {
                parse_expr(&sum)?
            }
        }
        "DATEDIFF" if args.len() == 3 => {
            let unit = normalise_unit(&args[0]);
            let a = if is_string_literal(&args[1]) {
                format!("CAST({} AS TIMESTAMP)", args[1])
            } else {
                args[1].clone()
            };
            let b = if is_string_literal(&args[2]) {
                format!("CAST({} AS TIMESTAMP)", args[2])
            } else {
                args[2].clone()
            };
            parse_expr(&format!("date_diff('{unit}', {a}, {b})"))?
        }
        "REGEXP_REPLACE" => {
            if args.len() > 3 {
                return Err(SqlError::Unsupported(
                    "REGEXP_REPLACE with additional parameters (eg: <position>, <occurrence>, <parameters>)"
                        .to_string(),
                ));
            }
            if args.len() < 2 {
                return Ok(None);
            }
            let pattern = if is_string_literal(&args[1]) {
                format!("'{}'", unescape_regex(args[1].trim_matches('\'')))
            } else {
                args[1].clone()
            };
            let replacement = args.get(2).cloned().unwrap_or_else(|| "''".to_string());
            // replacements are global in the target dialect
            parse_expr(&format!(
                "regexp_replace({}, {pattern}, {replacement}, 'g')",
                args[0]
            ))?
        }
        "REGEXP_SUBSTR" => {
            if args.len() < 2 {
                return Ok(None);
            }
            let subject = args[0].clone();
            let pattern = if is_string_literal(&args[1]) {
                format!("'{}'", unescape_regex(args[1].trim_matches('\'')))
            } else {
                args[1].clone()
            };
            let position = args.get(2).cloned().unwrap_or_else(|| "1".to_string());
            let subject = if position == "1" {
                subject
            } else {
                format!("{subject}[{position}:]")
            };
            let occurrence = args.get(3).cloned().unwrap_or_else(|| "1".to_string());
            let params: String = args
                .get(4)
                .map(|p| p.trim_matches('\'').replace('e', ""))
                .unwrap_or_default();
            let group = args.get(5).cloned().unwrap_or_else(|| {
                let had_e = args.get(4).map(|p| p.contains('e')).unwrap_or(false);
                if had_e { "1".to_string() } else { "0".to_string() }
            });
            parse_expr(&format!(
                "regexp_extract_all({subject}, {pattern}, {group}, '{params}')[{occurrence}]"
            ))?
        }
        "CURRENT_SCHEMA" => parse_expr("upper(current_schema())")?,
        "CURRENT_DATABASE" => parse_expr("upper(current_database())")?,
        _ => return Ok(None),
    };
    Ok(Some(replacement))
}

/// ARRAY_AGG keeps its modifiers (DISTINCT, WITHIN GROUP ordering, OVER) and
/// gains a `to_json` wrapper so a JSON array surfaces.
fn array_agg(function: &Function, args: &[String]) -> SqlResult<Expr> {
    let distinct = matches!(
        &function.args,
        FunctionArguments::List(list) if list.duplicate_treatment.is_some()
    );
    let order_by = if function.within_group.is_empty() {
        String::new()
    } else {
        let orderings: Vec<String> = function
            .within_group
            .iter()
            .map(|o| o.to_string())
            .collect();
        format!(" ORDER BY {}", orderings.join(", "))
    };
    let over = match &function.over {
        Some(window) => format!(" OVER ({window})"),
        None => String::new(),
    };
    let distinct_kw = if distinct { "DISTINCT " } else { "" };
    parse_expr(&format!(
        "to_json(array_agg({distinct_kw}{}{order_by}){over})",
        args.join(", ")
    ))
}

struct NextvalAlias;

impl VisitorMut for NextvalAlias {
    type Break = ();

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<()> {
        if let SetExpr::Select(select) = query.body.as_mut() {
            for item in &mut select.projection {
                let replacement = match item {
                    SelectItem::UnnamedExpr(Expr::Function(f))
                        if function_name(f) == "NEXTVAL" =>
                    {
                        Some(Expr::Function(f.clone()))
                    }
                    _ => None,
                };
                if let Some(expr) = replacement {
                    *item = SelectItem::ExprWithAlias {
                        expr,
                        alias: sqlparser::ast::Ident::new("NEXTVAL"),
                    };
                }
            }
        }
        ControlFlow::Continue(())
    }
}

/// One bottom-up pass over expressions covering the function shims,
/// `seq.nextval` lowering, and TRIM's implicit VARCHAR cast.
pub fn function_shims(
    statement: &mut Statement,
    _ctx: &TransformContext,
    tags: &mut Tags,
) -> SqlResult<()> {
    let mut seed: Option<String> = None;

    rewrite_exprs(statement, |expr| {
        match expr {
            Expr::Function(function) => {
                if let Some(replacement) = shim_function(function, &mut seed)? {
                    *expr = replacement;
                }
            }
            // seq_name.nextval → nextval('seq_name')
            Expr::CompoundIdentifier(parts)
                if parts
                    .last()
                    .map(|p| p.value.eq_ignore_ascii_case("nextval"))
                    .unwrap_or(false)
                    && parts.len() >= 2 =>
            {
                let seq_name = parts[..parts.len() - 1]
                    .iter()
                    .map(|p| p.value.clone())
                    .collect::<Vec<_>>()
                    .join(".");
                *expr = parse_expr(&format!("nextval('{seq_name}')"))?;
            }
            // TRIM casts its input to VARCHAR implicitly
            Expr::Trim { expr: operand, .. } => {
                let already_cast = matches!(
                    operand.as_ref(),
                    Expr::Cast { data_type, .. }
                        if data_type.to_string().to_uppercase().starts_with("VARCHAR")
                            || data_type.to_string().to_uppercase().starts_with("TEXT")
                );
                if !already_cast {
                    let cast = cast_to_varchar(operand)?;
                    *operand = Box::new(cast);
                }
            }
            _ => {}
        }
        Ok(())
    })?;

    if seed.is_some() {
        tags.seed = seed;
    }

    let _ = statement.visit(&mut NextvalAlias);
    Ok(())
}
