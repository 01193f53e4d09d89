pub mod capability;
pub mod compiler;
pub mod config;
pub mod db;
pub mod error;
pub mod intent;
pub mod llm;
pub mod planner;
pub mod repair;
pub mod schema;
pub mod service;
pub mod validator;

pub use capability::{Generator, RepairRequest, Row, SchemaIntrospector, SqlExecutor, SqlRepairer};
pub use compiler::compile;
pub use error::{QueryError, Result, ValidationError};
pub use intent::{QueryIntent, SortDirection, TimeRange};
pub use planner::{resolve, LogicalPlan};
pub use repair::{RepairOrchestrator, ValidatedSql};
pub use schema::{Schema, SchemaCache, SchemaGraph, SemanticCatalog};
pub use service::{DatabaseHandle, QueryResponse, QueryService};
pub use validator::validate;
