//! Schema Catalog
//!
//! Read-only model of one database: table → columns plus the foreign-key graph.
//! Built once through [`SchemaBuilder`] and never mutated afterwards; a schema
//! change means building and swapping in a whole new [`Schema`].

use crate::schema::graph::SchemaGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Schema {
    tables: BTreeMap<String, Vec<String>>,
    graph: SchemaGraph,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .map(|cols| cols.iter().any(|c| c == column))
            .unwrap_or(false)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tables.iter().map(|(t, cols)| (t.as_str(), cols.as_slice()))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: BTreeMap<String, Vec<String>>,
    graph: SchemaGraph,
}

impl SchemaBuilder {
    pub fn column(mut self, table: &str, column: &str) -> Self {
        self.add_column(table, column);
        self
    }

    pub fn table(mut self, table: &str, columns: &[&str]) -> Self {
        for column in columns {
            self.add_column(table, column);
        }
        self
    }

    pub fn foreign_key(
        mut self,
        table: &str,
        column: &str,
        referenced_table: &str,
        referenced_column: &str,
    ) -> Self {
        self.add_foreign_key(table, column, referenced_table, referenced_column);
        self
    }

    pub fn add_column(&mut self, table: &str, column: &str) {
        self.graph.add_node(table);
        let columns = self.tables.entry(table.to_string()).or_default();
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_string());
        }
    }

    /// Record `table.column → referenced_table.referenced_column`.
    pub fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        referenced_table: &str,
        referenced_column: &str,
    ) {
        self.graph
            .add_edge(referenced_table, referenced_column, table, column);
    }

    pub fn build(self) -> Schema {
        Schema {
            tables: self.tables,
            graph: self.graph,
        }
    }
}

/// Serialized schema form, used for offline planning and fixtures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub tables: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl From<SchemaSpec> for Schema {
    fn from(spec: SchemaSpec) -> Self {
        let mut builder = Schema::builder();
        for (table, columns) in &spec.tables {
            for column in columns {
                builder.add_column(table, column);
            }
        }
        for fk in &spec.foreign_keys {
            builder.add_foreign_key(&fk.table, &fk.column, &fk.referenced_table, &fk.referenced_column);
        }
        builder.build()
    }
}

impl From<&Schema> for SchemaSpec {
    fn from(schema: &Schema) -> Self {
        let foreign_keys = schema
            .graph
            .all_edges()
            .iter()
            .map(|edge| ForeignKey {
                table: edge.to_table.clone(),
                column: column_of(&edge.join_on.right).to_string(),
                referenced_table: edge.from_table.clone(),
                referenced_column: column_of(&edge.join_on.left).to_string(),
            })
            .collect();
        SchemaSpec {
            tables: schema.tables.clone(),
            foreign_keys,
        }
    }
}

fn column_of(qualified: &str) -> &str {
    qualified
        .split_once('.')
        .map(|(_, column)| column)
        .unwrap_or(qualified)
}
