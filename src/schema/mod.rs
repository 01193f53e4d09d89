pub mod cache;
pub mod catalog;
pub mod graph;
pub mod semantic;

pub use cache::SchemaCache;
pub use catalog::{ForeignKey, Schema, SchemaBuilder, SchemaSpec};
pub use graph::{JoinEdge, JoinOn, SchemaGraph};
pub use semantic::{MetricDefinition, SemanticCatalog};
