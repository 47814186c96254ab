//! Shared AST walkers for the transform library.
//!
//! Expression rewrites run in post-order so a replacement node is never
//! re-visited and nested shims resolve innermost-first.

use sqlparser::ast::{Expr, Statement, TableFactor, VisitMut, VisitorMut};
use std::ops::ControlFlow;

use crate::error::SqlResult;

struct ExprWalker<F> {
    f: F,
    err: Option<crate::error::SqlError>,
}

impl<F> VisitorMut for ExprWalker<F>
where
    F: FnMut(&mut Expr) -> SqlResult<()>,
{
    type Break = ();

    fn post_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<()> {
        if self.err.is_some() {
            return ControlFlow::Break(());
        }
        if let Err(e) = (self.f)(expr) {
            self.err = Some(e);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

/// Rewrite every expression in the statement, bottom-up.
pub(crate) fn rewrite_exprs<F>(statement: &mut Statement, f: F) -> SqlResult<()>
where
    F: FnMut(&mut Expr) -> SqlResult<()>,
{
    let mut walker = ExprWalker { f, err: None };
    let _ = statement.visit(&mut walker);
    match walker.err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct TableFactorWalker<F> {
    f: F,
    err: Option<crate::error::SqlError>,
}

impl<F> VisitorMut for TableFactorWalker<F>
where
    F: FnMut(&mut TableFactor) -> SqlResult<()>,
{
    type Break = ();

    fn pre_visit_table_factor(&mut self, table_factor: &mut TableFactor) -> ControlFlow<()> {
        if self.err.is_some() {
            return ControlFlow::Break(());
        }
        if let Err(e) = (self.f)(table_factor) {
            self.err = Some(e);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

/// Rewrite every table factor in the statement.
pub(crate) fn rewrite_table_factors<F>(statement: &mut Statement, f: F) -> SqlResult<()>
where
    F: FnMut(&mut TableFactor) -> SqlResult<()>,
{
    let mut walker = TableFactorWalker { f, err: None };
    let _ = statement.visit(&mut walker);
    match walker.err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
