//! Turret - error event ingestion and storage
//!
//! Accepts Sentry-style event payloads, stores them with a unique
//! `event_id`, and serves filtered, paginated views over them.

pub mod config;
pub mod event;
pub mod query;
pub mod service;
pub mod storage;
pub mod utils;

pub use event::{EventKey, EventRecord, NewEvent};
pub use query::{ListCriteria, Page};
pub use service::{ErrorKind, EventService, IngestReceipt, TurretError};
pub use storage::{init_storage, EventStore, StorageError};
