//! Semantic Catalog
//!
//! Business vocabulary layered over a schema: canonical entities and their
//! tables, natural-language aliases, and metric definitions.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metric definition: aggregate expression, the table it reads, and its time column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub expression: String,
    /// `None` means the metric is computed on the entity's own table.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub time_column: Option<String>,
}

impl MetricDefinition {
    pub fn new(expression: &str, table: Option<&str>, time_column: Option<&str>) -> Self {
        Self {
            expression: expression.to_string(),
            table: table.map(str::to_string),
            time_column: time_column.map(str::to_string),
        }
    }

    pub fn required_table<'a>(&'a self, base_table: &'a str) -> &'a str {
        self.table.as_deref().unwrap_or(base_table)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticCatalog {
    /// Canonical entity name → table name.
    pub entities: BTreeMap<String, String>,
    /// Synonym → canonical entity name.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, MetricDefinition>,
}

impl SemanticCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: SemanticCatalog = serde_json::from_str(&content)?;
        catalog.check()?;
        Ok(catalog)
    }

    /// Every alias must point at a known entity.
    pub fn check(&self) -> Result<()> {
        for (alias, canonical) in &self.aliases {
            if !self.entities.contains_key(canonical) {
                return Err(QueryError::Config(format!(
                    "Alias '{}' points at unknown entity '{}'",
                    alias, canonical
                )));
            }
        }
        Ok(())
    }

    /// Canonical entity name for `name`, through the alias table (identity if no alias).
    pub fn canonical_entity<'a>(&'a self, name: &'a str) -> &'a str {
        lookup(&self.aliases, name)
            .map(|(_, canonical)| canonical.as_str())
            .unwrap_or(name)
    }

    /// Resolve `name` (alias or canonical) to `(canonical, table)`.
    pub fn entity(&self, name: &str) -> Option<(&str, &str)> {
        let canonical = self.canonical_entity(name);
        lookup(&self.entities, canonical).map(|(k, table)| (k.as_str(), table.as_str()))
    }

    pub fn metric(&self, name: &str) -> Option<(&str, &MetricDefinition)> {
        lookup(&self.metrics, name).map(|(k, m)| (k.as_str(), m))
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities
            .keys()
            .chain(self.aliases.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.keys().map(String::as_str).collect()
    }

    /// Catalog for the Sakila sample database.
    pub fn sakila() -> Self {
        let entities = [
            ("Customer", "customer"),
            ("Film", "film"),
            ("Actor", "actor"),
            ("Inventory", "inventory"),
            ("Store", "store"),
        ];
        let aliases = [
            ("Movie", "Film"),
            ("Movies", "Film"),
            ("Users", "Customer"),
            ("Clients", "Customer"),
        ];

        let mut metrics = BTreeMap::new();
        metrics.insert(
            "Revenue".to_string(),
            MetricDefinition::new("SUM(payment.amount)", Some("payment"), Some("payment_date")),
        );
        metrics.insert("Count".to_string(), MetricDefinition::new("COUNT(*)", None, None));

        Self {
            entities: entities
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            aliases: aliases
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metrics,
        }
    }
}

/// Exact key match first, then ASCII case-insensitive.
fn lookup<'a, V>(map: &'a BTreeMap<String, V>, name: &str) -> Option<(&'a String, &'a V)> {
    map.get_key_value(name)
        .or_else(|| map.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)))
}
