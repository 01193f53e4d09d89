//! Semantic Resolver
//!
//! Maps a [`QueryIntent`] onto a [`LogicalPlan`] using the semantic catalog
//! and the schema graph. Joins come from the graph only: the path between the
//! entity's table and the metric's table is the shortest foreign-key path, and
//! each hop contributes the edge's stored join columns.

use crate::compiler::qualified;
use crate::error::{QueryError, Result, ValidationError};
use crate::intent::{QueryIntent, TimeRange};
use crate::planner::plan::LogicalPlan;
use crate::schema::catalog::Schema;
use crate::schema::semantic::SemanticCatalog;
use chrono::{Datelike, Duration, Local, NaiveDate};
use tracing::{debug, info};

/// Resolve against today's local date.
pub fn resolve(intent: &QueryIntent, semantics: &SemanticCatalog, schema: &Schema) -> Result<LogicalPlan> {
    resolve_at(intent, semantics, schema, Local::now().date_naive())
}

/// Resolve with an explicit "today", which anchors relative time ranges.
pub fn resolve_at(
    intent: &QueryIntent,
    semantics: &SemanticCatalog,
    schema: &Schema,
    today: NaiveDate,
) -> Result<LogicalPlan> {
    let (entity, base_table) = semantics.entity(intent.entity()).ok_or_else(|| {
        QueryError::UnknownEntity(semantics.canonical_entity(intent.entity()).to_string())
    })?;
    if !schema.has_table(base_table) {
        return Err(ValidationError::UnknownTable(base_table.to_string()).into());
    }

    let (metric_name, metric) = semantics
        .metric(intent.metric())
        .ok_or_else(|| QueryError::UnknownMetric(intent.metric().to_string()))?;
    let required_table = metric.required_table(base_table);
    if !schema.has_table(required_table) {
        return Err(ValidationError::UnknownTable(required_table.to_string()).into());
    }

    let joins = if required_table != base_table {
        let path = schema
            .graph()
            .shortest_path(base_table, required_table)
            .ok_or_else(|| QueryError::NoJoinPath {
                from: base_table.to_string(),
                to: required_table.to_string(),
            })?;
        path.into_iter().map(|edge| edge.join_on.clone()).collect()
    } else {
        Vec::new()
    };

    let mut filters = Vec::new();
    if intent.time_range() == TimeRange::LastMonth {
        if let Some(time_column) = &metric.time_column {
            if !schema.has_column(required_table, time_column) {
                return Err(ValidationError::UnknownColumn(format!(
                    "{}.{}",
                    required_table, time_column
                ))
                .into());
            }
            let (start, end) = last_month_window(today);
            filters.push(format!(
                "{} BETWEEN '{}' AND '{}'",
                qualified(required_table, time_column),
                start,
                end
            ));
        } else {
            debug!("Metric '{}' has no time column, ignoring time range", metric_name);
        }
    }

    let key = qualified(base_table, &primary_key(schema, base_table)?);
    let select = vec![key.clone(), format!("{} AS value", metric.expression)];

    info!(
        "Resolved {} / {} → base '{}', {} join(s), {} filter(s)",
        entity,
        metric_name,
        base_table,
        joins.len(),
        filters.len()
    );

    Ok(LogicalPlan {
        base_table: base_table.to_string(),
        joins,
        select,
        filters,
        group_by: vec![key],
        order_by: vec![format!("value {}", intent.direction().as_sql())],
        limit: Some(intent.limit()),
    })
}

/// `[first day of previous month, today]`.
pub fn last_month_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first_of_month = today - Duration::days(today.day0() as i64);
    let last_of_previous = first_of_month - Duration::days(1);
    let start = last_of_previous - Duration::days(last_of_previous.day0() as i64);
    (start, today)
}

/// Primary key column: `<table>_id`, falling back to `id`.
pub fn primary_key(schema: &Schema, table: &str) -> Result<String> {
    let conventional = format!("{}_id", table);
    if schema.has_column(table, &conventional) {
        return Ok(conventional);
    }
    if schema.has_column(table, "id") {
        return Ok("id".to_string());
    }
    Err(QueryError::MissingPrimaryKey(table.to_string()))
}
