use crate::capability::{Row, SchemaIntrospector, SqlExecutor};
use crate::config::DatabaseConfig;
use crate::db::connection::connect_lazy;
use crate::error::{QueryError, Result};
use crate::schema::catalog::Schema;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info};

const COLUMNS_SQL: &str = r#"
    SELECT table_name::text, column_name::text
    FROM information_schema.columns
    WHERE table_schema = $1
    ORDER BY table_name, ordinal_position
"#;

/// One row per foreign-key column, matched to its referenced column by position
/// so composite keys pair up correctly.
const FOREIGN_KEYS_SQL: &str = r#"
    SELECT kcu.table_name::text, kcu.column_name::text,
           rcu.table_name::text, rcu.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_name = tc.constraint_name
     AND kcu.table_schema = tc.table_schema
    JOIN information_schema.referential_constraints rc
      ON rc.constraint_name = tc.constraint_name
     AND rc.constraint_schema = tc.table_schema
    JOIN information_schema.key_column_usage rcu
      ON rcu.constraint_name = rc.unique_constraint_name
     AND rcu.constraint_schema = rc.unique_constraint_schema
     AND rcu.ordinal_position = kcu.position_in_unique_constraint
    WHERE tc.constraint_type = 'FOREIGN KEY'
      AND tc.table_schema = $1
    ORDER BY kcu.table_name, tc.constraint_name, kcu.ordinal_position
"#;

pub struct PostgresBackend {
    pool: PgPool,
    namespace: String,
}

impl PostgresBackend {
    pub fn new(pool: PgPool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(connect_lazy(config), config.schema.clone())
    }
}

#[async_trait]
impl SchemaIntrospector for PostgresBackend {
    async fn introspect(&self) -> Result<Schema> {
        let columns: Vec<(String, String)> = sqlx::query_as(COLUMNS_SQL)
            .bind(&self.namespace)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| QueryError::Database(format!("Failed to load columns: {}", e)))?;

        let foreign_keys: Vec<(String, String, String, String)> = sqlx::query_as(FOREIGN_KEYS_SQL)
            .bind(&self.namespace)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| QueryError::Database(format!("Failed to load foreign keys: {}", e)))?;

        info!(
            "Introspected schema '{}': {} columns, {} foreign-key columns",
            self.namespace,
            columns.len(),
            foreign_keys.len()
        );
        Ok(build_schema(columns, foreign_keys))
    }
}

#[async_trait]
impl SqlExecutor for PostgresBackend {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        let wrapped = wrap_as_json(sql);
        debug!("Executing: {}", wrapped);

        let failed = |e: sqlx::Error| QueryError::ExecutionFailed(e.to_string());
        let mut tx = self.pool.begin().await.map_err(failed)?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        let (value,): (Value,) = sqlx::query_as(&wrapped)
            .fetch_one(&mut *tx)
            .await
            .map_err(failed)?;
        tx.rollback().await.map_err(failed)?;

        rows_from_json(value)
    }
}

/// Aggregate the statement's rows into one JSON array so any column types come back uniformly.
///
/// The body sits on its own lines so a trailing `--` comment cannot swallow the closing paren.
fn wrap_as_json(sql: &str) -> String {
    let body = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT COALESCE(json_agg(t), '[]'::json) FROM (\n{}\n) t", body)
}

fn rows_from_json(value: Value) -> Result<Vec<Row>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(QueryError::ExecutionFailed(format!("Unexpected row shape: {}", other))),
            })
            .collect(),
        other => Err(QueryError::ExecutionFailed(format!("Unexpected result shape: {}", other))),
    }
}

fn build_schema(columns: Vec<(String, String)>, foreign_keys: Vec<(String, String, String, String)>) -> Schema {
    let mut builder = Schema::builder();
    for (table, column) in &columns {
        builder.add_column(table, column);
    }
    for (table, column, referenced_table, referenced_column) in &foreign_keys {
        builder.add_foreign_key(table, column, referenced_table, referenced_column);
    }
    builder.build()
}
