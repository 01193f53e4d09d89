//! External Capabilities
//!
//! Contracts the query core requires from its collaborators. The core never
//! talks to a model or a database directly; it goes through these traits, so
//! the pipeline runs unchanged against live backends or test doubles.

use crate::error::{Result, ValidationError};
use crate::schema::catalog::Schema;
use crate::schema::semantic::SemanticCatalog;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One result row, column name → value.
pub type Row = Map<String, Value>;

/// Produces the schema graph and column catalog of one database.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    async fn introspect(&self) -> Result<Schema>;
}

/// Turns a question into a candidate: raw SQL text or an intent document.
///
/// Output is untrusted either way; callers validate it before use.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_sql(&self, question: &str, schema: &Schema) -> Result<String>;

    /// JSON intent document for the semantic path. See [`crate::intent::QueryIntent::from_json`].
    async fn generate_intent(&self, question: &str, semantics: &SemanticCatalog) -> Result<String>;
}

/// What a repair attempt gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct RepairRequest<'a> {
    pub invalid_sql: &'a str,
    pub error: &'a ValidationError,
    pub schema: &'a Schema,
    pub question: &'a str,
}

#[async_trait]
pub trait SqlRepairer: Send + Sync {
    async fn repair_sql(&self, request: &RepairRequest<'_>) -> Result<String>;
}

/// Runs already-validated SQL.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>>;
}
