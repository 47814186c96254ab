//! SQL parser wrapper and small parsing helpers used by the transforms

use crate::dialect::{DuckDbDialect, SnowflakeDialect, SqlDialect};
use crate::error::{SqlError, SqlResult};
use sqlparser::ast::{DataType, Expr, Query, Statement};
use sqlparser::dialect::DuckDbDialect as RawDuckDb;
use sqlparser::parser::Parser;

/// SQL parser that wraps sqlparser-rs with dialect support
pub struct SqlParser {
    dialect: Box<dyn SqlDialect>,
}

impl SqlParser {
    /// Create a new parser for the target (Snowflake) dialect
    pub fn snowflake() -> Self {
        Self {
            dialect: Box::new(SnowflakeDialect::new()),
        }
    }

    /// Create a new parser for the host (DuckDB) dialect
    pub fn duckdb() -> Self {
        Self {
            dialect: Box::new(DuckDbDialect::new()),
        }
    }

    /// Parse SQL into AST statements
    pub fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(SqlError::EmptySql);
        }

        self.dialect.parse(sql)
    }

    /// Parse SQL and return the first statement
    pub fn parse_single(&self, sql: &str) -> SqlResult<Statement> {
        let stmts = self.parse(sql)?;
        stmts.into_iter().next().ok_or(SqlError::EmptySql)
    }

    /// Get the dialect name
    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::snowflake()
    }
}

/// Parse a single expression in the host dialect.
///
/// Transforms that build replacement nodes render the pieces they need and
/// re-parse, which keeps them decoupled from the parser's node constructors.
pub fn parse_expr(sql: &str) -> SqlResult<Expr> {
    let dialect = RawDuckDb {};
    Parser::new(&dialect)
        .try_with_sql(sql)
        .and_then(|mut p| p.parse_expr())
        .map_err(|e| SqlError::ParseError {
            message: format!("{e} in expression: {sql}"),
        })
}

/// Parse a data type in the host dialect (e.g. `BIGINT`, `DECIMAL(10,2)`).
pub fn parse_data_type(sql: &str) -> SqlResult<DataType> {
    let dialect = RawDuckDb {};
    Parser::new(&dialect)
        .try_with_sql(sql)
        .and_then(|mut p| p.parse_data_type())
        .map_err(|e| SqlError::ParseError {
            message: format!("{e} in data type: {sql}"),
        })
}

/// Parse a `SELECT ...` string into a [`Query`] node.
pub fn parse_query(sql: &str) -> SqlResult<Query> {
    match SqlParser::duckdb().parse_single(sql)? {
        Statement::Query(q) => Ok(*q),
        other => Err(SqlError::ParseError {
            message: format!("expected a query, got: {other}"),
        }),
    }
}

/// Split a script into individual statement strings.
///
/// Splits on `;` outside of string literals, quoted identifiers, and
/// comments. Fragments that contain only whitespace or comments are
/// dropped, so `execute_string` never yields a cursor for a pure comment.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                current.push(c);
                // consume until the matching close quote, honouring '' escapes
                while let Some(n) = chars.next() {
                    current.push(n);
                    if n == c {
                        if chars.peek() == Some(&c) {
                            current.push(chars.next().unwrap());
                        } else {
                            break;
                        }
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                // line comment
                for n in chars.by_ref() {
                    if n == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            ';' => {
                if !current.trim().is_empty() {
                    statements.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select() {
        let parser = SqlParser::snowflake();
        let stmts = parser
            .parse("SELECT id, name FROM users WHERE id = 1")
            .unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_parse_empty() {
        let parser = SqlParser::snowflake();
        assert!(matches!(parser.parse("  "), Err(SqlError::EmptySql)));
    }

    #[test]
    fn test_parse_error() {
        let parser = SqlParser::snowflake();
        assert!(parser.parse("SELECT FROM WHERE").is_err());
    }

    #[test]
    fn test_parse_expr() {
        let e = parse_expr("json_extract(x, '$.a')").unwrap();
        assert_eq!(e.to_string(), "json_extract(x, '$.a')");
    }

    #[test]
    fn test_parse_data_type() {
        let dt = parse_data_type("DECIMAL(10,2)").unwrap();
        assert_eq!(dt.to_string().replace(' ', ""), "DECIMAL(10,2)");
    }

    #[test]
    fn test_split_statements() {
        let parts = split_statements("SELECT 1; SELECT ';' -- trailing\n; /* block */ SELECT 3");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "SELECT 1");
        assert_eq!(parts[1], "SELECT ';'");
        assert_eq!(parts[2], "SELECT 3");
    }

    #[test]
    fn test_split_statements_drops_comment_only() {
        let parts = split_statements("-- just a comment\n; SELECT 1;");
        assert_eq!(parts, vec!["SELECT 1".to_string()]);
    }
}
