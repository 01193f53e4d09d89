//! SQL Compiler
//!
//! Renders a [`LogicalPlan`] into SQL text. Pure and deterministic; clause
//! order is fixed:
//!
//! `SELECT … FROM base {JOIN t ON l = r}* [WHERE …] [GROUP BY …] [ORDER BY …] [LIMIT n]`
//!
//! Optional clauses are emitted only when the plan has content for them, so the
//! output never carries an empty clause.

use crate::planner::plan::{joined_table, LogicalPlan};
use std::borrow::Cow;

/// PostgreSQL reserved words, plus the join words that are reserved for
/// table names.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "cross",
    "current_catalog", "current_date", "current_role", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end", "except",
    "false", "fetch", "for", "foreign", "from", "full", "grant", "group", "having", "in",
    "initially", "inner", "intersect", "into", "join", "lateral", "leading", "left", "limit",
    "localtime", "localtimestamp", "natural", "not", "null", "offset", "on", "only", "or",
    "order", "outer", "placing", "primary", "references", "returning", "right", "select",
    "session_user", "some", "symmetric", "system_user", "table", "then", "to", "trailing",
    "true", "union", "unique", "user", "using", "variadic", "when", "where", "window", "with",
];

pub fn compile(plan: &LogicalPlan) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        plan.select.join(", "),
        quote_ident(&plan.base_table)
    );

    let mut in_scope = vec![plan.base_table.as_str()];
    for join in &plan.joins {
        let table = joined_table(&in_scope, join);
        sql.push_str(&format!(
            " JOIN {} ON {} = {}",
            quote_ident(table),
            render_column(&join.left),
            render_column(&join.right)
        ));
        in_scope.push(table);
    }

    if !plan.filters.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&plan.filters.join(" AND "));
    }
    if !plan.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&plan.group_by.join(", "));
    }
    if !plan.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&plan.order_by.join(", "));
    }
    if let Some(limit) = plan.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    sql
}

/// `name` as a SQL identifier, double-quoted when PostgreSQL would otherwise
/// fold its case or read it as a keyword.
pub fn quote_ident(name: &str) -> Cow<'_, str> {
    let plain = name.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !RESERVED.contains(&name);
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// `table.column` with each part quoted as needed.
pub fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}

/// Render a stored `table.column` join side.
fn render_column(reference: &str) -> String {
    match reference.split_once('.') {
        Some((table, column)) => qualified(table, column),
        None => quote_ident(reference).into_owned(),
    }
}
