//! Unified SQL storage implementations.
//!
//! This module provides the shared EventStore implementation for SQL-based
//! storage backends (PostgreSQL, SQLite). The implementation is parameterized
//! by database type using the `SqlDatabase` trait.

mod event_store;
mod query;

pub use event_store::SqlEventStore;
pub use query::SqlDatabase;

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use sea_query::PostgresQueryBuilder;
    use sea_query_binder::{SqlxBinder, SqlxValues};
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;

    use crate::config::PostgresConfig;
    use crate::storage::schema::POSTGRES_CREATE_EVENTS;
    use crate::storage::Result;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;

        const SCHEMA: &'static [&'static str] = POSTGRES_CREATE_EVENTS;

        // READ COMMITTED takes a fresh snapshot per statement.
        const SNAPSHOT_READ: Option<&'static str> =
            Some("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY");

        fn build_select(stmt: &sea_query::SelectStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }

        fn build_insert(stmt: &sea_query::InsertStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL event store.
    pub type PostgresEventStore = super::SqlEventStore<Postgres>;

    impl PostgresEventStore {
        /// Open a connection pool for the configured URI.
        pub async fn connect(config: &PostgresConfig) -> Result<Self> {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .connect(&config.uri)
                .await?;
            Ok(Self::new(pool))
        }
    }
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use std::str::FromStr;
    use std::time::Duration;

    use sea_query::SqliteQueryBuilder;
    use sea_query_binder::{SqlxBinder, SqlxValues};
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use sqlx::SqlitePool;

    use crate::config::SqliteConfig;
    use crate::storage::schema::SQLITE_CREATE_EVENTS;
    use crate::storage::Result;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;

        const SCHEMA: &'static [&'static str] = SQLITE_CREATE_EVENTS;

        // A SQLite read transaction holds one snapshot until it ends.
        const SNAPSHOT_READ: Option<&'static str> = None;

        fn build_select(stmt: &sea_query::SelectStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }

        fn build_insert(stmt: &sea_query::InsertStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }
    }

    /// SQLite event store.
    pub type SqliteEventStore = super::SqlEventStore<Sqlite>;

    impl SqliteEventStore {
        /// Open a connection pool for the configured database.
        ///
        /// `LIKE` is made case-sensitive on every connection so search
        /// behaves as it does on PostgreSQL. An in-memory database lives as
        /// long as its connection, so it gets exactly one that never expires.
        pub async fn connect(config: &SqliteConfig) -> Result<Self> {
            let pool = if config.is_in_memory() {
                let options = SqliteConnectOptions::from_str("sqlite::memory:")?
                    .pragma("case_sensitive_like", "ON");
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>)
                    .connect_with(options)
                    .await?
            } else {
                if let Some(parent) = std::path::Path::new(&config.path).parent() {
                    std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(&config.path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .pragma("case_sensitive_like", "ON");
                SqlitePoolOptions::new()
                    .max_connections(config.max_connections.max(1))
                    .connect_with(options)
                    .await?
            };
            Ok(Self::new(pool))
        }
    }
}
