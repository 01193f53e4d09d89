//! Schema Graph
//!
//! Directed foreign-key graph over table names. An edge points from the
//! referenced table to the dependent table and carries the exact join columns.
//!
//! Path finding ignores edge direction: a join may be walked from either side,
//! but the stored `join_on` orientation is always preserved.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Fully-qualified join columns of a foreign key: `(referenced.column, dependent.column)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinOn {
    pub left: String,
    pub right: String,
}

impl JoinOn {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn left_table(&self) -> &str {
        table_of(&self.left)
    }

    pub fn right_table(&self) -> &str {
        table_of(&self.right)
    }
}

/// Table qualifier of a `table.column` reference.
pub fn table_of(qualified: &str) -> &str {
    qualified
        .split_once('.')
        .map(|(table, _)| table)
        .unwrap_or(qualified)
}

/// Foreign-key edge: `from_table` is referenced, `to_table` depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEdge {
    pub from_table: String,
    pub to_table: String,
    pub join_on: JoinOn,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<JoinEdge>,
    /// Per node: (neighbor node, edge id) for incident edges in either direction.
    incident: Vec<Vec<(usize, usize)>>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table node, returning its index. Insertion order drives path tie-breaks.
    pub(crate) fn add_node(&mut self, table: &str) -> usize {
        if let Some(&idx) = self.index.get(table) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(table.to_string());
        self.index.insert(table.to_string(), idx);
        self.incident.push(Vec::new());
        idx
    }

    pub(crate) fn add_edge(
        &mut self,
        referenced_table: &str,
        referenced_column: &str,
        dependent_table: &str,
        dependent_column: &str,
    ) {
        let from = self.add_node(referenced_table);
        let to = self.add_node(dependent_table);
        let edge_id = self.edges.len();
        self.edges.push(JoinEdge {
            from_table: referenced_table.to_string(),
            to_table: dependent_table.to_string(),
            join_on: JoinOn::new(
                format!("{}.{}", referenced_table, referenced_column),
                format!("{}.{}", dependent_table, dependent_column),
            ),
        });
        self.incident[from].push((to, edge_id));
        if from != to {
            self.incident[to].push((from, edge_id));
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.index.contains_key(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn all_edges(&self) -> &[JoinEdge] {
        &self.edges
    }

    /// First stored edge `from → to`, if any.
    pub fn edge(&self, from: &str, to: &str) -> Option<&JoinEdge> {
        self.edges(from, to).next()
    }

    /// Every stored edge `from → to`. Two tables may be linked by several foreign keys.
    pub fn edges<'a, 'b>(&'a self, from: &'b str, to: &'b str) -> impl Iterator<Item = &'a JoinEdge> + 'b
    where
        'a: 'b,
    {
        self.edges
            .iter()
            .filter(move |e| e.from_table == from && e.to_table == to)
    }

    /// Shortest undirected path from `from` to `to`, as the edges walked in order.
    ///
    /// Unweighted BFS. Neighbors are expanded in node-insertion order, then edge
    /// insertion order, so the result is deterministic for a fixed graph.
    /// Returns `Some(vec![])` when `from == to`, `None` when unreachable.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<&JoinEdge>> {
        let start = *self.index.get(from)?;
        let goal = *self.index.get(to)?;
        if start == goal {
            return Some(Vec::new());
        }

        let mut parent: Vec<Option<(usize, usize)>> = vec![None; self.nodes.len()];
        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            let mut neighbors = self.incident[node].clone();
            neighbors.sort_unstable();
            for (next, edge_id) in neighbors {
                if visited[next] {
                    continue;
                }
                visited[next] = true;
                parent[next] = Some((node, edge_id));
                if next == goal {
                    return Some(self.unwind(&parent, goal));
                }
                queue.push_back(next);
            }
        }

        None
    }

    fn unwind(&self, parent: &[Option<(usize, usize)>], goal: usize) -> Vec<&JoinEdge> {
        let mut path = Vec::new();
        let mut cursor = goal;
        while let Some((prev, edge_id)) = parent[cursor] {
            path.push(&self.edges[edge_id]);
            cursor = prev;
        }
        path.reverse();
        path
    }
}
