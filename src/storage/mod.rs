//! Storage implementations.
//!
//! The [`EventStore`] trait is the persistence seam. Handles are created by
//! [`init_storage`] and passed explicitly to whoever needs them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::{StorageConfig, StorageType};
use crate::event::{EventKey, EventRecord, NewEvent};
use crate::query::{ListQuery, Page};

pub mod mock;
pub mod schema;
pub mod sql;

pub use mock::MockEventStore;
#[cfg(feature = "postgres")]
pub use sql::postgres::PostgresEventStore;
#[cfg(feature = "sqlite")]
pub use sql::sqlite::SqliteEventStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Event ID already exists: {event_id}")]
    Conflict { event_id: String },

    #[error("Event not found: {0}")]
    NotFound(EventKey),

    #[error("Stored event {id} is unreadable: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

impl StorageError {
    /// Whether the failure is a storage fault rather than a property of
    /// the request. Only these are worth retrying, and that is the
    /// caller's call.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Interface for event persistence.
///
/// Events are append-only: created once by [`insert`](EventStore::insert),
/// never updated or deleted.
///
/// Implementations:
/// - `SqliteEventStore`: SQLite storage
/// - `PostgresEventStore`: PostgreSQL storage
/// - `MockEventStore`: In-memory storage for testing
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a new event and return its assigned id.
    ///
    /// `event_id` uniqueness is enforced by the backend itself; a duplicate
    /// yields [`StorageError::Conflict`], even when two inserts race.
    async fn insert(&self, event: NewEvent) -> Result<i64>;

    /// Point lookup.
    async fn get(&self, key: &EventKey) -> Result<EventRecord>;

    /// Filtered page of events, most recent first (`timestamp` then `id`,
    /// both descending), with the total count of matches.
    async fn list(&self, query: &ListQuery) -> Result<Page<EventRecord>>;
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn EventStore>> {
    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!("Storage: sqlite at {}", config.sqlite.path);
            let store = SqliteEventStore::connect(&config.sqlite).await?;
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            info!("Storage: postgres");
            let store = PostgresEventStore::connect(&config.postgres).await?;
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => {
            error!("{} storage requested but the '{}' feature is not enabled", other, other);
            Err(StorageError::Unavailable(sqlx::Error::Configuration(
                format!("{} feature not enabled", other).into(),
            )))
        }
    }
}
