//! Pre-execution qualification checks.
//!
//! Determines whether a statement refers to tables without a database or
//! schema qualifier, so the cursor can fail with the warehouse's 90105/90106
//! codes when the session has no current database or schema.

use sqlparser::ast::{ObjectName, Query, Statement, TableFactor, Visit, Visitor};
use std::collections::HashSet;
use std::ops::ControlFlow;

use crate::command;

/// Result of scanning a statement for unqualified table references.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Qualification {
    /// At least one reference lacks a database qualifier
    pub missing_database: bool,
    /// At least one reference lacks a schema qualifier
    pub missing_schema: bool,
}

struct QualificationCheck {
    cte_names: HashSet<String>,
    skip_next_relation: bool,
    result: Qualification,
}

impl Visitor for QualificationCheck {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names.insert(cte.alias.name.value.to_uppercase());
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<()> {
        // table functions (read_csv, generate_series, ...) have no schema
        if let TableFactor::Table { args: Some(_), .. } = table_factor {
            self.skip_next_relation = true;
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<()> {
        if self.skip_next_relation {
            self.skip_next_relation = false;
            return ControlFlow::Continue(());
        }
        match relation.0.len() {
            1 => {
                let name = relation.0[0].to_string().to_uppercase();
                if !self.cte_names.contains(name.trim_matches('"')) {
                    self.result.missing_database = true;
                    self.result.missing_schema = true;
                }
            }
            2 => self.result.missing_database = true,
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Scan a parsed statement for unqualified table references.
///
/// Schema-level DDL is special-cased: a one-part schema name is missing only
/// its database. CTE names are not table references.
pub fn is_unqualified_table_expression(statement: &Statement, cmd: &str) -> Qualification {
    if matches!(cmd, "CREATE SCHEMA" | "DROP SCHEMA" | "ALTER SCHEMA") {
        let sql = statement.to_string();
        let parts = command::object_name_parts(&sql);
        return Qualification {
            missing_database: parts == 1,
            missing_schema: false,
        };
    }
    if matches!(
        cmd,
        "CREATE DATABASE" | "DROP DATABASE" | "BEGIN" | "COMMIT" | "ROLLBACK" | "SET"
    ) {
        return Qualification::default();
    }

    let mut check = QualificationCheck {
        cte_names: HashSet::new(),
        skip_next_relation: false,
        result: Qualification::default(),
    };
    let _ = statement.visit(&mut check);
    check.result
}
