//! Event service.
//!
//! The three calls a transport layer needs: ingest a payload, fetch one
//! event, list events. Validation happens before the store is touched, and
//! every failure reaches the caller as a [`TurretError`] with enough
//! structure to pick a response.

use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::QueryLimits;
use crate::event::{self, EventKey, EventRecord, NormalizeError};
use crate::query::{self, ListCriteria, Page, QueryError};
use crate::storage::{EventStore, StorageError};

/// Result type for service calls.
pub type Result<T> = std::result::Result<T, TurretError>;

/// Any failure surfaced by the event service.
#[derive(Debug, thiserror::Error)]
pub enum TurretError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Flat classification of [`TurretError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedPayload,
    Validation,
    Conflict,
    NotFound,
    InvalidRange,
    StorageUnavailable,
    /// A stored row could not be read back.
    Internal,
}

impl TurretError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TurretError::Normalize(NormalizeError::MalformedPayload { .. }) => {
                ErrorKind::MalformedPayload
            }
            TurretError::Normalize(NormalizeError::Validation { .. }) => ErrorKind::Validation,
            TurretError::Query(QueryError::InvalidRange { .. }) => ErrorKind::InvalidRange,
            TurretError::Query(QueryError::InvalidPagination { .. }) => ErrorKind::Validation,
            TurretError::Storage(StorageError::Conflict { .. }) => ErrorKind::Conflict,
            TurretError::Storage(StorageError::NotFound(_)) => ErrorKind::NotFound,
            TurretError::Storage(StorageError::Unavailable(_)) => ErrorKind::StorageUnavailable,
            TurretError::Storage(StorageError::Corrupt { .. })
            | TurretError::Storage(StorageError::Serialization(_)) => ErrorKind::Internal,
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::MalformedPayload | ErrorKind::Validation | ErrorKind::InvalidRange => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Offending field, for validation failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            TurretError::Normalize(NormalizeError::Validation { field, .. }) => Some(*field),
            TurretError::Query(QueryError::InvalidPagination { field }) => Some(*field),
            _ => None,
        }
    }
}

/// Successful ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReceipt {
    pub id: i64,
    pub message: &'static str,
}

impl IngestReceipt {
    /// Status for a successful ingest.
    pub const STATUS: StatusCode = StatusCode::CREATED;
}

/// Entry point for ingesting and reading events.
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    limits: QueryLimits,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Normalize `body` and store it under `project_id`.
    #[tracing::instrument(name = "events.ingest", skip(self, body))]
    pub async fn ingest(&self, project_id: i64, body: &[u8]) -> Result<IngestReceipt> {
        let new_event = event::parse_payload(body)
            .and_then(|payload| event::normalize(project_id, payload))
            .inspect_err(|e| debug!(error = %e, "Rejected payload"))?;
        let event_id = new_event.event_id.clone();

        match self.store.insert(new_event).await {
            Ok(id) => {
                info!(id, %event_id, "Event created");
                Ok(IngestReceipt {
                    id,
                    message: "Event created successfully",
                })
            }
            Err(e @ StorageError::Conflict { .. }) => {
                warn!(%event_id, "Duplicate event_id");
                Err(e.into())
            }
            Err(e) => {
                error!(%event_id, error = %e, "Failed to store event");
                Err(e.into())
            }
        }
    }

    /// Fetch a single event by surrogate id or client event id.
    ///
    /// A numeric identifier is tried as a surrogate id first, then as a
    /// client event id, so all-digit event ids stay reachable.
    #[tracing::instrument(name = "events.detail", skip(self))]
    pub async fn detail(&self, identifier: &str) -> Result<EventRecord> {
        let key = EventKey::parse(identifier);
        let found = match self.store.get(&key).await {
            Err(StorageError::NotFound(EventKey::Id(_))) => {
                let key = EventKey::EventId(identifier.to_string());
                self.store.get(&key).await
            }
            other => other,
        };
        found.map_err(|e| {
            if e.is_unavailable() {
                error!(%key, error = %e, "Failed to load event");
            }
            e.into()
        })
    }

    /// List events matching `criteria`.
    #[tracing::instrument(name = "events.list", skip_all)]
    pub async fn list(&self, criteria: ListCriteria) -> Result<Page<EventRecord>> {
        let query = query::compose(criteria, &self.limits)?;
        debug!(?query, "Listing events");
        self.store.list(&query).await.map_err(|e| {
            error!(error = %e, "Failed to list events");
            e.into()
        })
    }
}
