//! Connection pools built from [`DatabaseConfig`] entries.

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

/// Build a pool without connecting; the first query opens the connection.
///
/// Credentials are passed as discrete options, so passwords with URL
/// metacharacters need no escaping.
pub fn connect_lazy(config: &DatabaseConfig) -> PgPool {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database);

    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(30))
        .connect_lazy_with(options)
}
