//! Query Intent
//!
//! Typed intermediate representation of a natural-language question. Intents
//! arrive from outside (usually a language model) and are untrusted: every
//! constructor path, including deserialization, validates required fields
//! before an intent can reach the resolver.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_METRIC: &str = "Count";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    LastMonth,
    AllTime,
    #[default]
    None,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::LastMonth => "last_month",
            TimeRange::AllTime => "all_time",
            TimeRange::None => "none",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "last_month" => Ok(TimeRange::LastMonth),
            "all_time" => Ok(TimeRange::AllTime),
            "none" | "" => Ok(TimeRange::None),
            other => Err(QueryError::InvalidIntent(format!(
                "Unknown time range '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(QueryError::InvalidIntent(format!(
                "Unknown sort direction '{}'",
                other
            ))),
        }
    }
}

/// A validated query intent. Fields are private so the invariants hold:
/// non-empty entity and metric, positive limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIntent")]
pub struct QueryIntent {
    entity: String,
    metric: String,
    time_range: TimeRange,
    direction: SortDirection,
    limit: u32,
}

impl QueryIntent {
    pub fn new(entity: &str, metric: &str, time_range: TimeRange, limit: Option<u32>) -> Result<Self> {
        let entity = entity.trim();
        if entity.is_empty() {
            return Err(QueryError::InvalidIntent("entity is required".to_string()));
        }
        let metric = metric.trim();
        if metric.is_empty() {
            return Err(QueryError::InvalidIntent("metric must not be empty".to_string()));
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 {
            return Err(QueryError::InvalidIntent("limit must be positive".to_string()));
        }
        Ok(Self {
            entity: entity.to_string(),
            metric: metric.to_string(),
            time_range,
            direction: SortDirection::Desc,
            limit,
        })
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Parse an intent from model output, tolerating a surrounding markdown fence.
    pub fn from_json(raw: &str) -> Result<Self> {
        let cleaned = raw
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        serde_json::from_str(cleaned).map_err(|e| QueryError::InvalidIntent(e.to_string()))
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Wire form accepted from outside. Also takes the older
/// `filters: [{"value": "last_month"}]` and `order_by: [{"direction": ...}]` shapes.
#[derive(Debug, Deserialize)]
struct RawIntent {
    entity: Option<String>,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    time_range: Option<String>,
    #[serde(default)]
    filters: Option<Vec<LegacyTimeFilter>>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    order_by: Option<Vec<LegacyOrderBy>>,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LegacyTimeFilter {
    value: String,
}

#[derive(Debug, Deserialize)]
struct LegacyOrderBy {
    #[serde(default)]
    direction: Option<String>,
}

impl TryFrom<RawIntent> for QueryIntent {
    type Error = QueryError;

    fn try_from(raw: RawIntent) -> Result<Self> {
        let entity = raw
            .entity
            .ok_or_else(|| QueryError::InvalidIntent("entity is required".to_string()))?;
        let metric = raw.metric.unwrap_or_else(|| DEFAULT_METRIC.to_string());

        let time_range = match (raw.time_range, raw.filters) {
            (Some(value), _) => TimeRange::parse(&value)?,
            (None, Some(filters)) => match filters.first() {
                Some(filter) => TimeRange::parse(&filter.value)?,
                None => TimeRange::None,
            },
            (None, None) => TimeRange::None,
        };

        let limit = match raw.limit {
            None => None,
            Some(n) if n > 0 && n <= u32::MAX as i64 => Some(n as u32),
            Some(n) => {
                return Err(QueryError::InvalidIntent(format!(
                    "limit must be a positive integer, got {}",
                    n
                )))
            }
        };

        let direction = match raw.direction.or_else(|| {
            raw.order_by
                .and_then(|orders| orders.into_iter().next())
                .and_then(|order| order.direction)
        }) {
            Some(value) => SortDirection::parse(&value)?,
            None => SortDirection::Desc,
        };

        Ok(QueryIntent::new(&entity, &metric, time_range, limit)?.with_direction(direction))
    }
}
