#![allow(dead_code)]

use async_trait::async_trait;
use semantic_sql::capability::{Generator, RepairRequest, Row, SchemaIntrospector, SqlExecutor, SqlRepairer};
use semantic_sql::error::{QueryError, Result};
use semantic_sql::schema::{Schema, SemanticCatalog};
use semantic_sql::{DatabaseHandle, QueryService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sakila subset with the rental chain and a table no foreign key reaches.
pub fn sakila_schema() -> Schema {
    Schema::builder()
        .table("actor", &["actor_id", "first_name", "last_name", "last_update"])
        .table("customer", &["customer_id", "store_id", "first_name", "last_name", "last_update"])
        .table("film", &["film_id", "title", "rating", "release_year", "language_id"])
        .table("language", &["language_id", "name"])
        .table("inventory", &["inventory_id", "film_id", "store_id"])
        .table("rental", &["rental_id", "rental_date", "inventory_id", "customer_id"])
        .table("payment", &["payment_id", "customer_id", "rental_id", "amount", "payment_date"])
        .table("store", &["store_id", "address_id"])
        .table("staff_notes", &["note_id", "body"])
        .table("film_actor", &["actor_id", "film_id"])
        .foreign_key("film_actor", "actor_id", "actor", "actor_id")
        .foreign_key("film_actor", "film_id", "film", "film_id")
        .foreign_key("film", "language_id", "language", "language_id")
        .foreign_key("inventory", "film_id", "film", "film_id")
        .foreign_key("inventory", "store_id", "store", "store_id")
        .foreign_key("customer", "store_id", "store", "store_id")
        .foreign_key("rental", "inventory_id", "inventory", "inventory_id")
        .foreign_key("rental", "customer_id", "customer", "customer_id")
        .foreign_key("payment", "rental_id", "rental", "rental_id")
        .foreign_key("payment", "customer_id", "customer", "customer_id")
        .build()
}

pub struct FakeIntrospector {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeIntrospector {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0), fail: false }
    }

    pub fn failing() -> Self {
        Self { calls: AtomicUsize::new(0), fail: true }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaIntrospector for FakeIntrospector {
    async fn introspect(&self) -> Result<Schema> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail {
            return Err(QueryError::Database("connection refused".to_string()));
        }
        Ok(sakila_schema())
    }
}

/// Returns fixed text for SQL and intent generation.
pub struct ScriptedGenerator {
    pub sql: Result<String>,
    pub intent: String,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn sql(sql: &str) -> Self {
        Self { sql: Ok(sql.to_string()), intent: String::new(), calls: AtomicUsize::new(0) }
    }

    pub fn intent(json: &str) -> Self {
        Self { sql: Ok(String::new()), intent: json.to_string(), calls: AtomicUsize::new(0) }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            sql: Err(QueryError::Llm(reason.to_string())),
            intent: String::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_sql(&self, _question: &str, _schema: &Schema) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.sql {
            Ok(sql) => Ok(sql.clone()),
            Err(err) => Err(QueryError::Llm(err.to_string())),
        }
    }

    async fn generate_intent(&self, _question: &str, _semantics: &SemanticCatalog) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.intent.clone())
    }
}

/// Replies with a fixed SQL string and records what it was asked to fix.
pub struct RecordingRepairer {
    pub reply: String,
    pub requests: Mutex<Vec<(String, String)>>,
}

impl RecordingRepairer {
    pub fn replying(sql: &str) -> Self {
        Self { reply: sql.to_string(), requests: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SqlRepairer for RecordingRepairer {
    async fn repair_sql(&self, request: &RepairRequest<'_>) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((request.invalid_sql.to_string(), request.error.kind().to_string()));
        Ok(self.reply.clone())
    }
}

pub struct RecordingExecutor {
    pub executed: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self { executed: Mutex::new(Vec::new()) }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        self.executed.lock().unwrap().push(sql.to_string());
        let row = serde_json::json!({"film_id": 1, "value": 42.5});
        Ok(vec![row.as_object().cloned().unwrap_or_default()])
    }
}

pub struct Harness {
    pub introspector: Arc<FakeIntrospector>,
    pub generator: Arc<ScriptedGenerator>,
    pub repairer: Arc<RecordingRepairer>,
    pub executor: Arc<RecordingExecutor>,
    pub service: QueryService,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator, repairer: RecordingRepairer) -> Self {
        Self::with_introspector(FakeIntrospector::new(), generator, repairer)
    }

    pub fn with_introspector(
        introspector: FakeIntrospector,
        generator: ScriptedGenerator,
        repairer: RecordingRepairer,
    ) -> Self {
        let introspector = Arc::new(introspector);
        let generator = Arc::new(generator);
        let repairer = Arc::new(repairer);
        let executor = Arc::new(RecordingExecutor::new());
        let service = QueryService::new(SemanticCatalog::sakila(), generator.clone(), repairer.clone())
            .with_database("sakila", DatabaseHandle::new(introspector.clone(), executor.clone()));
        Self { introspector, generator, repairer, executor, service }
    }
}
