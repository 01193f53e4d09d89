//! Schema Cache
//!
//! One [`Schema`] per database name, built lazily on first use and kept for the
//! life of the process.
//!
//! Concurrency: the outer map lock is held only long enough to fetch or insert
//! the per-database cell. The build itself runs inside that cell's
//! `get_or_try_init`, so concurrent first requests for the same database wait
//! on a single build. A failed build leaves the cell empty and the next request
//! retries. Cached schemas are shared as `Arc<Schema>` and never mutated.

use crate::error::{QueryError, Result};
use crate::schema::catalog::Schema;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::info;

#[derive(Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<Schema>>>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached schema for `database`, running `build` at most once at a time.
    pub async fn get_or_build<F, Fut>(&self, database: &str, build: F) -> Result<Arc<Schema>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Schema>>,
    {
        let cell = self.cell(database);
        let schema = cell
            .get_or_try_init(|| async move {
                info!("Building schema for database '{}'", database);
                let schema = build().await?;
                info!(
                    "Schema for '{}' ready: {} tables, {} foreign keys",
                    database,
                    schema.table_count(),
                    schema.graph().all_edges().len()
                );
                Ok::<_, QueryError>(Arc::new(schema))
            })
            .await?;
        Ok(Arc::clone(schema))
    }

    pub fn get(&self, database: &str) -> Option<Arc<Schema>> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.get(database).and_then(|cell| cell.get().cloned())
    }

    /// Drop the cached schema so the next request rebuilds it. Requests already
    /// holding the old `Arc<Schema>` keep using it.
    pub fn invalidate(&self, database: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let removed = entries.remove(database).is_some();
        if removed {
            info!("Invalidated schema cache for '{}'", database);
        }
        removed
    }

    fn cell(&self, database: &str) -> Arc<OnceCell<Arc<Schema>>> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(
            entries
                .entry(database.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }
}
