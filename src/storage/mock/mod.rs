//! Mock storage implementation for testing.
//!
//! Keeps events in memory behind a single lock, so the `event_id` check
//! and the insert happen atomically just as they do under a database
//! unique constraint.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EventStore, Result, StorageError};
use crate::event::{EventKey, EventRecord, NewEvent};
use crate::query::{ListQuery, Page};

#[derive(Default)]
struct Inner {
    events: BTreeMap<i64, EventRecord>,
    by_event_id: HashMap<String, i64>,
    last_id: i64,
}

/// Mock event store that stores events in memory.
#[derive(Default)]
pub struct MockEventStore {
    inner: RwLock<Inner>,
    unavailable: RwLock<bool>,
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail as if the backend were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn check_available(&self) -> Result<()> {
        if *self.unavailable.read().await {
            return Err(StorageError::Unavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn insert(&self, event: NewEvent) -> Result<i64> {
        self.check_available().await?;

        let mut inner = self.inner.write().await;
        if inner.by_event_id.contains_key(&event.event_id) {
            return Err(StorageError::Conflict {
                event_id: event.event_id,
            });
        }

        inner.last_id += 1;
        let id = inner.last_id;
        inner.by_event_id.insert(event.event_id.clone(), id);
        inner.events.insert(id, event.into_record(id));
        Ok(id)
    }

    async fn get(&self, key: &EventKey) -> Result<EventRecord> {
        self.check_available().await?;

        let inner = self.inner.read().await;
        let id = match key {
            EventKey::Id(id) => Some(*id),
            EventKey::EventId(event_id) => inner.by_event_id.get(event_id).copied(),
        };
        id.and_then(|id| inner.events.get(&id))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<EventRecord>> {
        self.check_available().await?;

        let inner = self.inner.read().await;
        let mut matched: Vec<&EventRecord> = inner
            .events
            .values()
            .filter(|r| {
                query
                    .filter
                    .matches(r.project_id, &r.timestamp, &r.searchable_strings)
            })
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit() as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page: query.page.page,
            page_size: query.page.page_size,
        })
    }
}
