use thiserror::Error;

/// Rejections raised by the SQL validator. Each kind carries the offending token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Forbidden SQL operation detected: {0}")]
    ForbiddenOperation(String),

    #[error("Multiple SQL statements detected near: {0}")]
    MultiStatement(String),

    #[error("Only SELECT statements are allowed, found: {0}")]
    NotASelect(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown table alias: {0}")]
    UnknownAlias(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Invalid join: {0}")]
    InvalidJoin(String),
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::ForbiddenOperation(_) => "ForbiddenOperation",
            ValidationError::MultiStatement(_) => "MultiStatement",
            ValidationError::NotASelect(_) => "NotASelect",
            ValidationError::UnknownTable(_) => "UnknownTable",
            ValidationError::UnknownAlias(_) => "UnknownAlias",
            ValidationError::UnknownColumn(_) => "UnknownColumn",
            ValidationError::InvalidJoin(_) => "InvalidJoin",
        }
    }

    pub fn token(&self) -> &str {
        match self {
            ValidationError::ForbiddenOperation(t)
            | ValidationError::MultiStatement(t)
            | ValidationError::NotASelect(t)
            | ValidationError::UnknownTable(t)
            | ValidationError::UnknownAlias(t)
            | ValidationError::UnknownColumn(t)
            | ValidationError::InvalidJoin(t) => t,
        }
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("No join path from '{from}' to '{to}'")]
    NoJoinPath { from: String, to: String },

    #[error("Table '{0}' has no primary key column")]
    MissingPrimaryKey(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("SQL generation/repair failed: initial error: {initial}; repair error: {repair}")]
    RepairExhausted {
        initial: ValidationError,
        repair: ValidationError,
        candidate_sql: String,
    },

    #[error("SQL generation failed: {0}")]
    GenerationFailed(String),

    #[error("SQL repair failed: {0}")]
    RepairFailed(String),

    #[error("SQL execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Failed to build schema for database '{database}': {reason}")]
    IntrospectionFailed { database: String, reason: String },

    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueryError {
    /// Structural failures mean the intent itself cannot be satisfied; they are never repaired.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            QueryError::InvalidIntent(_)
                | QueryError::UnknownEntity(_)
                | QueryError::UnknownMetric(_)
                | QueryError::NoJoinPath { .. }
                | QueryError::MissingPrimaryKey(_)
        )
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        QueryError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
