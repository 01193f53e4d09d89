//! PostgreSQL backend: schema introspection and read-only execution.

pub mod connection;
pub mod postgres;

pub use connection::connect_lazy;
pub use postgres::PostgresBackend;
