//! MERGE planner.
//!
//! A MERGE statement becomes a bounded sequence: materialise the candidate
//! rows once (FULL OUTER JOIN of target and source, each row labelled with
//! the index of the first WHEN clause it satisfies, CASE semantics), then one
//! targeted DELETE/UPDATE/INSERT per WHEN clause, then a count-reporting
//! SELECT. The cursor runs the sequence inside a transaction so row ids stay
//! stable across the DML statements.

use sqlparser::ast::{
    MergeAction, MergeClause, MergeClauseKind, MergeInsertKind, Statement, TableFactor,
};

use super::HostStatement;
use crate::error::{SqlError, SqlResult};

/// The temporary table holding the labelled join.
const CANDIDATES: &str = "merge_candidates";

enum OpKind {
    Insert,
    Update,
    Delete,
}

/// Expand a MERGE statement into host statements; the final statement is the
/// count-reporting SELECT.
pub fn plan(statement: &Statement) -> SqlResult<Vec<HostStatement>> {
    let Statement::Merge {
        table,
        source,
        on,
        clauses,
        ..
    } = statement
    else {
        return Err(SqlError::Unsupported("not a MERGE statement".to_string()));
    };

    let target_display = table.to_string();
    let target_ident = factor_ident(table)
        .ok_or_else(|| SqlError::Unsupported("MERGE into a non-table target".to_string()))?;
    let target_name = factor_table_name(table)
        .ok_or_else(|| SqlError::Unsupported("MERGE into a non-table target".to_string()))?;
    let source_display = source.to_string();
    let source_ident = factor_ident(source).ok_or_else(|| {
        SqlError::Unsupported("MERGE source requires a table name or alias".to_string())
    })?;
    let on_sql = on.to_string();

    let mut statements = vec![candidates_sql(
        &target_display,
        &target_ident,
        &source_display,
        &source_ident,
        &on_sql,
        clauses,
    )?];

    for (idx, clause) in clauses.iter().enumerate() {
        statements.push(mutation_sql(
            idx,
            clause,
            &target_display,
            &target_name,
            &source_ident,
            &on_sql,
        )?);
    }

    statements.push(counts_sql(clauses)?);
    Ok(statements.into_iter().map(HostStatement::plain).collect())
}

fn op_kind(clause: &MergeClause) -> SqlResult<OpKind> {
    match (&clause.clause_kind, &clause.action) {
        (MergeClauseKind::Matched, MergeAction::Update { .. }) => Ok(OpKind::Update),
        (MergeClauseKind::Matched, MergeAction::Delete) => Ok(OpKind::Delete),
        (MergeClauseKind::NotMatched | MergeClauseKind::NotMatchedByTarget, MergeAction::Insert(_)) => {
            Ok(OpKind::Insert)
        }
        _ => Err(SqlError::Unsupported(format!(
            "MERGE clause {} {}",
            clause.clause_kind, clause.action
        ))),
    }
}

fn candidates_sql(
    target_display: &str,
    target_ident: &str,
    source_display: &str,
    source_ident: &str,
    on_sql: &str,
    clauses: &[MergeClause],
) -> SqlResult<String> {
    let mut when_arms: Vec<String> = Vec::with_capacity(clauses.len());

    for (idx, clause) in clauses.iter().enumerate() {
        let arm = match op_kind(clause)? {
            OpKind::Update | OpKind::Delete => {
                let predicate = match &clause.predicate {
                    Some(condition) => format!("({on_sql}) AND ({condition})"),
                    None => on_sql.to_string(),
                };
                format!("WHEN {predicate} THEN {idx}")
            }
            OpKind::Insert => {
                let extra = match &clause.predicate {
                    Some(condition) => format!(" AND ({condition})"),
                    None => String::new(),
                };
                format!("WHEN {target_ident}.rowid IS NULL{extra} THEN {idx}")
            }
        };
        when_arms.push(arm);
    }

    Ok(format!(
        "CREATE OR REPLACE TEMPORARY TABLE {CANDIDATES} AS \
         SELECT {source_ident}.*, CASE {arms} ELSE NULL END AS MERGE_OP \
         FROM {target_display} FULL OUTER JOIN {source_display} ON {on_sql} \
         WHERE MERGE_OP IS NOT NULL",
        arms = when_arms.join(" ")
    ))
}

fn mutation_sql(
    idx: usize,
    clause: &MergeClause,
    target_display: &str,
    target_name: &str,
    source_ident: &str,
    on_sql: &str,
) -> SqlResult<String> {
    match (op_kind(clause)?, &clause.action) {
        (OpKind::Delete, _) => Ok(format!(
            "DELETE FROM {target_display} USING {CANDIDATES} AS {source_ident} \
             WHERE {on_sql} AND {source_ident}.merge_op = {idx}"
        )),
        (OpKind::Update, MergeAction::Update { assignments }) => {
            // the host rejects alias-qualified column names in SET
            let sets: Vec<String> = assignments
                .iter()
                .map(|assignment| {
                    let target = assignment.target.to_string();
                    let column = target.rsplit('.').next().unwrap_or(&target).to_string();
                    format!("{column} = {}", assignment.value)
                })
                .collect();
            Ok(format!(
                "UPDATE {target_display} SET {sets} FROM {CANDIDATES} AS {source_ident} \
                 WHERE {on_sql} AND {source_ident}.merge_op = {idx}",
                sets = sets.join(", ")
            ))
        }
        (OpKind::Insert, MergeAction::Insert(insert)) => {
            let columns = if insert.columns.is_empty() {
                String::new()
            } else {
                format!(
                    " ({})",
                    insert
                        .columns
                        .iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            let values = match &insert.kind {
                MergeInsertKind::Values(values) => values
                    .rows
                    .first()
                    .map(|row| {
                        row.iter()
                            .map(|e| e.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default(),
                other => {
                    return Err(SqlError::Unsupported(format!(
                        "MERGE INSERT {other}"
                    )))
                }
            };
            Ok(format!(
                "INSERT INTO {target_name}{columns} SELECT {values} FROM {CANDIDATES} AS \
                 {source_ident} WHERE {source_ident}.merge_op = {idx}"
            ))
        }
        _ => unreachable!("op_kind and action are matched together"),
    }
}

fn counts_sql(clauses: &[MergeClause]) -> SqlResult<String> {
    let mut inserted: Vec<usize> = Vec::new();
    let mut updated: Vec<usize> = Vec::new();
    let mut deleted: Vec<usize> = Vec::new();

    for (idx, clause) in clauses.iter().enumerate() {
        match op_kind(clause)? {
            OpKind::Insert => inserted.push(idx),
            OpKind::Update => updated.push(idx),
            OpKind::Delete => deleted.push(idx),
        }
    }

    let mut columns: Vec<String> = Vec::new();
    for (label, indices) in [
        ("number of rows inserted", inserted),
        ("number of rows updated", updated),
        ("number of rows deleted", deleted),
    ] {
        if !indices.is_empty() {
            let list = indices
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(",");
            columns.push(format!("COUNT_IF(merge_op IN ({list})) AS \"{label}\""));
        }
    }

    Ok(format!(
        "SELECT {} FROM {CANDIDATES}",
        columns.join(", ")
    ))
}

fn factor_ident(factor: &TableFactor) -> Option<String> {
    match factor {
        TableFactor::Table { name, alias, .. } => match alias {
            Some(alias) => Some(alias.name.to_string()),
            None => name.0.last().map(|p| p.to_string()),
        },
        TableFactor::Derived { alias, .. } => alias.as_ref().map(|a| a.name.to_string()),
        _ => None,
    }
}

fn factor_table_name(factor: &TableFactor) -> Option<String> {
    match factor {
        TableFactor::Table { name, .. } => Some(name.to_string()),
        _ => None,
    }
}
