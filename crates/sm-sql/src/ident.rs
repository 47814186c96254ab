//! Identifier case handling.
//!
//! Snowflake surfaces case-insensitivity as upper-cased identifiers in
//! results and in its information schema; DuckDB preserves what it is given.
//! Every unquoted identifier is therefore upper-cased before reaching the
//! host engine, and quoted identifiers pass through untouched.

use sqlparser::ast::{
    Expr, Ident, ObjectName, ObjectNamePart, Query, SetExpr, Statement, TableFactor, VisitMut,
    VisitorMut,
};
use std::ops::ControlFlow;

/// One segment of an object path, case-normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentPart {
    pub value: String,
    pub quoted: bool,
}

impl IdentPart {
    /// Parse a raw token: quoted parts keep their case, unquoted upper-case.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.starts_with('"') && token.ends_with('"') && token.len() >= 2 {
            IdentPart {
                value: token[1..token.len() - 1].to_string(),
                quoted: true,
            }
        } else {
            IdentPart {
                value: token.to_uppercase(),
                quoted: false,
            }
        }
    }

    /// Render back to SQL, quoting when required.
    pub fn sql(&self) -> String {
        if self.quoted {
            format!("\"{}\"", self.value.replace('"', "\"\""))
        } else {
            self.value.clone()
        }
    }
}

/// Strip double quotes if present else return uppercased.
///
/// Snowflake treats quoted identifiers as case-sensitive and un-quoted
/// identifiers as case-insensitive.
pub fn normalise_ident(name: &str) -> String {
    if name.starts_with('"') && name.ends_with('"') && name.len() >= 2 {
        name[1..name.len() - 1].to_string()
    } else {
        name.to_uppercase()
    }
}

/// Upper-case a single identifier unless it is quoted.
pub fn upper_ident(ident: &mut Ident) {
    if ident.quote_style.is_none() {
        ident.value = ident.value.to_uppercase();
    }
}

/// Upper-case every unquoted part of an object name.
pub fn upper_object_name(name: &mut ObjectName) {
    for part in &mut name.0 {
        if let ObjectNamePart::Identifier(ident) = part {
            upper_ident(ident);
        }
    }
}

struct UpperCaseIdents;

impl VisitorMut for UpperCaseIdents {
    type Break = ();

    fn pre_visit_relation(&mut self, relation: &mut ObjectName) -> ControlFlow<()> {
        upper_object_name(relation);
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<()> {
        match expr {
            Expr::Identifier(ident) => upper_ident(ident),
            Expr::CompoundIdentifier(idents) => idents.iter_mut().for_each(upper_ident),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &mut TableFactor) -> ControlFlow<()> {
        let alias = match table_factor {
            TableFactor::Table { alias, .. } => alias,
            TableFactor::Derived { alias, .. } => alias,
            _ => return ControlFlow::Continue(()),
        };
        if let Some(alias) = alias {
            upper_ident(&mut alias.name);
            for col in &mut alias.columns {
                upper_ident(&mut col.name);
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<()> {
        // projection aliases determine result column names
        if let SetExpr::Select(select) = query.body.as_mut() {
            for item in &mut select.projection {
                if let sqlparser::ast::SelectItem::ExprWithAlias { alias, .. } = item {
                    upper_ident(alias);
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_statement(&mut self, statement: &mut Statement) -> ControlFlow<()> {
        // object and column names land in the host catalog, so their case
        // matters even where the generic walk has no hook
        match statement {
            Statement::CreateTable(create) => {
                upper_object_name(&mut create.name);
                for col in &mut create.columns {
                    upper_ident(&mut col.name);
                }
            }
            Statement::Drop { names, .. } => {
                for name in names {
                    upper_object_name(name);
                }
            }
            Statement::CreateDatabase { db_name, .. } => upper_object_name(db_name),
            Statement::CreateSchema { schema_name, .. } => {
                if let sqlparser::ast::SchemaName::Simple(name) = schema_name {
                    upper_object_name(name);
                }
            }
            Statement::CreateView { name, .. } => upper_object_name(name),
            Statement::CreateSequence { name, .. } => upper_object_name(name),
            Statement::AlterTable { name, .. } => upper_object_name(name),
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Upper case unquoted identifiers throughout a statement.
pub fn upper_case_unquoted_identifiers(statement: &mut Statement) {
    let _ = statement.visit(&mut UpperCaseIdents);
}
