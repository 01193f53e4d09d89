use crate::schema::graph::JoinOn;
use serde::{Deserialize, Serialize};

/// Schema-grounded query, ready to be rendered to SQL.
///
/// Every table named in `select`, `filters`, `group_by` and `order_by` is
/// either `base_table` or one reached through `joins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalPlan {
    pub base_table: String,
    /// Join columns in path order, each in the orientation stored on the graph edge.
    pub joins: Vec<JoinOn>,
    pub select: Vec<String>,
    pub filters: Vec<String>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<u32>,
}

impl LogicalPlan {
    /// Tables in scope, in the order they enter the FROM clause.
    ///
    /// A join adds the table of its right column unless that table is already
    /// in scope (the edge was walked backwards), in which case it adds the left.
    pub fn tables(&self) -> Vec<&str> {
        let mut tables = vec![self.base_table.as_str()];
        for join in &self.joins {
            let next = joined_table(&tables, join);
            tables.push(next);
        }
        tables
    }
}

pub(crate) fn joined_table<'a>(in_scope: &[&str], join: &'a JoinOn) -> &'a str {
    let right = join.right_table();
    if in_scope.contains(&right) {
        join.left_table()
    } else {
        right
    }
}
