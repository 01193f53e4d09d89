//! Configuration
//!
//! Settings come from the environment (a `.env` file is loaded by the binary)
//! plus two JSON files: the database registry and, optionally, a semantic
//! catalog overriding the built-in Sakila one.

use crate::error::{QueryError, Result};
use crate::schema::semantic::SemanticCatalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DATABASES_FILE: &str = "databases.json";
pub const DEFAULT_DATABASE: &str = "sakila";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let timeout_secs = match lookup("LLM_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                QueryError::Config(format!("LLM_TIMEOUT_SECS must be a number of seconds, got '{}'", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            api_key: lookup("LLM_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .filter(|key| !key.trim().is_empty()),
            base_url: lookup("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs,
        })
    }
}

/// Connection settings for one named database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Namespace that introspection reads tables from.
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub databases: BTreeMap<String, DatabaseConfig>,
    pub default_database: String,
    pub catalog_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let llm = LlmConfig::from_lookup(&lookup)?;

        let databases_file = lookup("DATABASES_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASES_FILE));
        let databases = if databases_file.exists() {
            load_databases(&databases_file)?
        } else {
            warn!("Database registry {:?} not found, no databases configured", databases_file);
            BTreeMap::new()
        };

        Ok(Self {
            llm,
            databases,
            default_database: lookup("DEFAULT_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            catalog_file: lookup("CATALOG_FILE").map(PathBuf::from),
        })
    }

    /// The configured semantic catalog, or the built-in Sakila catalog.
    pub fn semantic_catalog(&self) -> Result<SemanticCatalog> {
        match &self.catalog_file {
            Some(path) => {
                info!("Loading semantic catalog from {:?}", path);
                SemanticCatalog::load(path)
            }
            None => Ok(SemanticCatalog::sakila()),
        }
    }
}

/// Read a `name → DatabaseConfig` registry.
pub fn load_databases(path: &Path) -> Result<BTreeMap<String, DatabaseConfig>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| QueryError::Config(format!("Failed to read {:?}: {}", path, e)))?;
    let databases: BTreeMap<String, DatabaseConfig> = serde_json::from_str(&content)
        .map_err(|e| QueryError::Config(format!("Invalid database registry {:?}: {}", path, e)))?;
    info!("Loaded {} database(s) from {:?}", databases.len(), path);
    Ok(databases)
}
