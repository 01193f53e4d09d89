//! Query Service
//!
//! End-to-end request flow over the injected capabilities:
//!
//! - SQL path: question → generate SQL → validate → repair once → execute
//! - intent path: intent → resolve → compile → validate → repair once → execute
//!
//! Schemas come from a per-database [`SchemaCache`]. Generation, repair and
//! execution failures are terminal; only validation failures are retried, and
//! only through the [`RepairOrchestrator`].

use crate::capability::{Generator, Row, SchemaIntrospector, SqlExecutor, SqlRepairer};
use crate::compiler::compile;
use crate::config::AppConfig;
use crate::db::PostgresBackend;
use crate::error::{QueryError, Result};
use crate::intent::QueryIntent;
use crate::llm::LlmClient;
use crate::planner::{resolve, LogicalPlan};
use crate::repair::RepairOrchestrator;
use crate::schema::cache::SchemaCache;
use crate::schema::catalog::Schema;
use crate::schema::semantic::SemanticCatalog;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Backends for one named database.
#[derive(Clone)]
pub struct DatabaseHandle {
    pub introspector: Arc<dyn SchemaIntrospector>,
    pub executor: Arc<dyn SqlExecutor>,
}

impl DatabaseHandle {
    pub fn new(introspector: Arc<dyn SchemaIntrospector>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self { introspector, executor }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub request_id: Uuid,
    pub sql: String,
    pub repaired: bool,
    pub rows: Vec<Row>,
}

pub struct QueryService {
    cache: SchemaCache,
    semantics: SemanticCatalog,
    generator: Arc<dyn Generator>,
    repairer: Arc<dyn SqlRepairer>,
    databases: HashMap<String, DatabaseHandle>,
}

impl QueryService {
    pub fn new(
        semantics: SemanticCatalog,
        generator: Arc<dyn Generator>,
        repairer: Arc<dyn SqlRepairer>,
    ) -> Self {
        Self {
            cache: SchemaCache::new(),
            semantics,
            generator,
            repairer,
            databases: HashMap::new(),
        }
    }

    pub fn with_database(mut self, name: &str, handle: DatabaseHandle) -> Self {
        self.databases.insert(name.to_string(), handle);
        self
    }

    /// Live service: one LLM client for generation and repair, one Postgres backend per database.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let llm = Arc::new(LlmClient::new(&config.llm)?);
        let mut service = Self::new(config.semantic_catalog()?, llm.clone(), llm);
        for (name, db) in &config.databases {
            let backend = Arc::new(PostgresBackend::from_config(db));
            service = service.with_database(name, DatabaseHandle::new(backend.clone(), backend));
        }
        Ok(service)
    }

    pub fn semantics(&self) -> &SemanticCatalog {
        &self.semantics
    }

    /// Cached schema for `database`, introspecting on first use.
    pub async fn schema(&self, database: &str) -> Result<Arc<Schema>> {
        let handle = self.handle(database)?;
        self.cache
            .get_or_build(database, || async move {
                handle.introspector.introspect().await.map_err(|e| match e {
                    QueryError::IntrospectionFailed { .. } => e,
                    other => QueryError::IntrospectionFailed {
                        database: database.to_string(),
                        reason: other.to_string(),
                    },
                })
            })
            .await
    }

    /// Drop the cached schema for `database`; the next request re-introspects.
    pub fn clear_schema(&self, database: &str) -> bool {
        self.cache.invalidate(database)
    }

    /// Answer a question by having the model write SQL.
    pub async fn ask(&self, database: &str, question: &str) -> Result<QueryResponse> {
        let question = checked_question(question)?;
        let request_id = Uuid::new_v4();
        let handle = self.handle(database)?;
        let schema = self.schema(database).await?;
        info!("[{}] Generating SQL for '{}' on '{}'", request_id, question, database);

        let candidate = self
            .generator
            .generate_sql(question, &schema)
            .await
            .map_err(generation_failed)?;
        self.finish(request_id, handle, &schema, candidate, question).await
    }

    /// Answer a typed intent through the resolver and compiler.
    pub async fn ask_intent(&self, database: &str, intent: &QueryIntent) -> Result<QueryResponse> {
        let question = serde_json::to_string(intent)?;
        self.run_intent(Uuid::new_v4(), database, intent, &question).await
    }

    /// Answer a question by having the model produce an intent, then compiling it.
    pub async fn ask_semantic(&self, database: &str, question: &str) -> Result<QueryResponse> {
        let question = checked_question(question)?;
        let request_id = Uuid::new_v4();
        info!("[{}] Generating intent for '{}'", request_id, question);

        let raw = self
            .generator
            .generate_intent(question, &self.semantics)
            .await
            .map_err(generation_failed)?;
        let intent = QueryIntent::from_json(&raw)?;
        self.run_intent(request_id, database, &intent, question).await
    }

    /// Resolve and compile without executing.
    pub fn plan(&self, intent: &QueryIntent, schema: &Schema) -> Result<(LogicalPlan, String)> {
        let plan = resolve(intent, &self.semantics, schema)?;
        let sql = compile(&plan);
        Ok((plan, sql))
    }

    async fn run_intent(
        &self,
        request_id: Uuid,
        database: &str,
        intent: &QueryIntent,
        question: &str,
    ) -> Result<QueryResponse> {
        let handle = self.handle(database)?;
        let schema = self.schema(database).await?;
        let (_, sql) = self.plan(intent, &schema)?;
        info!("[{}] Compiled intent on '{}': {}", request_id, database, sql);
        self.finish(request_id, handle, &schema, sql, question).await
    }

    async fn finish(
        &self,
        request_id: Uuid,
        handle: &DatabaseHandle,
        schema: &Schema,
        candidate: String,
        question: &str,
    ) -> Result<QueryResponse> {
        let validated = RepairOrchestrator::new(schema, self.repairer.as_ref())
            .finalize(candidate, question)
            .await?;

        let rows = handle.executor.execute(&validated.sql).await.map_err(|e| match e {
            QueryError::ExecutionFailed(_) => e,
            other => QueryError::ExecutionFailed(other.to_string()),
        })?;
        info!(
            "[{}] Returned {} row(s){}",
            request_id,
            rows.len(),
            if validated.repaired { " after repair" } else { "" }
        );

        Ok(QueryResponse {
            request_id,
            sql: validated.sql,
            repaired: validated.repaired,
            rows,
        })
    }

    fn handle(&self, database: &str) -> Result<&DatabaseHandle> {
        self.databases
            .get(database)
            .ok_or_else(|| QueryError::UnknownDatabase(database.to_string()))
    }
}

fn checked_question(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(QueryError::InvalidRequest("Query not provided".to_string()));
    }
    Ok(question)
}

fn generation_failed(err: QueryError) -> QueryError {
    match err {
        QueryError::GenerationFailed(_) => err,
        other => QueryError::GenerationFailed(other.to_string()),
    }
}
