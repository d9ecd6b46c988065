//! Unified SQL EventStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use std::marker::PhantomData;

use sea_query::{Condition, Expr, LikeExpr, SimpleExpr};

use super::SqlDatabase;
use crate::event::{timestamp_from_storage, timestamp_to_storage, EventKey, EventRecord, Payload};
use crate::query::EventFilter;
use crate::storage::schema::Events;
use crate::storage::{Result, StorageError};

/// SQL-based implementation of EventStore.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlEventStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlEventStore<DB> {
    /// Create a new SQL event store with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// Row shape of the events table.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: i64,
    event_id: String,
    project_id: i64,
    timestamp: String,
    searchable_strings: String,
    event: String,
}

impl EventRow {
    fn into_record(self) -> Result<EventRecord> {
        let id = self.id;
        let timestamp = timestamp_from_storage(&self.timestamp).map_err(|e| {
            StorageError::Corrupt {
                id,
                reason: format!("timestamp '{}': {}", self.timestamp, e),
            }
        })?;
        let event: Payload = serde_json::from_str(&self.event).map_err(|e| StorageError::Corrupt {
            id,
            reason: format!("event payload: {}", e),
        })?;

        Ok(EventRecord {
            id,
            event_id: self.event_id,
            project_id: self.project_id,
            timestamp,
            searchable_strings: self.searchable_strings,
            event,
        })
    }
}

/// WHERE clause for a point lookup.
fn key_condition(key: &EventKey) -> SimpleExpr {
    match key {
        EventKey::Id(id) => Expr::col(Events::Id).eq(*id),
        EventKey::EventId(event_id) => Expr::col(Events::EventId).eq(event_id.as_str()),
    }
}

/// WHERE clause for a list filter. Absent predicates add nothing.
fn filter_condition(filter: &EventFilter) -> Condition {
    Condition::all()
        .add_option(filter.project_id.map(|p| Expr::col(Events::ProjectId).eq(p)))
        .add_option(
            filter
                .start
                .map(|s| Expr::col(Events::Timestamp).gte(timestamp_to_storage(&s))),
        )
        .add_option(
            filter
                .end
                .map(|e| Expr::col(Events::Timestamp).lte(timestamp_to_storage(&e))),
        )
        .add_option(filter.search.as_deref().map(|term| {
            Expr::col(Events::SearchableStrings)
                .like(LikeExpr::new(like_pattern(term)).escape(LIKE_ESCAPE))
        }))
}

/// Escape character for search patterns. Not a backslash, so the
/// `ESCAPE` clause reads the same on every backend.
const LIKE_ESCAPE: char = '!';

/// `%term%` with LIKE metacharacters in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Map an insert failure: unique violations are conflicts, everything else
/// is a storage fault.
fn insert_error(err: sqlx::Error, event_id: &str) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StorageError::Conflict {
                event_id: event_id.to_string(),
            };
        }
    }
    StorageError::Unavailable(err)
}

/// Macro to implement EventStore for a specific SQL backend.
///
/// This eliminates duplication between PostgreSQL and SQLite implementations
/// while maintaining full type safety.
macro_rules! impl_event_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlEventStore<$db_type> {
            /// Create the events table and its indexes if missing.
            pub async fn init(&self) -> Result<()> {
                for statement in <$db_type as SqlDatabase>::SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                Ok(())
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::EventStore for SqlEventStore<$db_type> {
            async fn insert(&self, event: crate::event::NewEvent) -> Result<i64> {
                use sea_query::Query;
                use sqlx::Row;

                let payload = serde_json::to_string(&event.event)?;

                let stmt = Query::insert()
                    .into_table(Events::Table)
                    .columns([
                        Events::EventId,
                        Events::ProjectId,
                        Events::Timestamp,
                        Events::SearchableStrings,
                        Events::Event,
                    ])
                    .values_panic([
                        event.event_id.as_str().into(),
                        event.project_id.into(),
                        timestamp_to_storage(&event.timestamp).into(),
                        event.searchable_strings.as_str().into(),
                        payload.into(),
                    ])
                    .returning_col(Events::Id)
                    .to_owned();

                let (sql, values) = <$db_type>::build_insert(&stmt);
                let row = sqlx::query_with(&sql, values)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| insert_error(e, &event.event_id))?;
                let id: i64 = row.try_get(0)?;

                tracing::debug!(id, event_id = %event.event_id, "event row inserted");
                Ok(id)
            }

            async fn get(&self, key: &EventKey) -> Result<EventRecord> {
                use sea_query::Query;

                use crate::storage::schema::EVENT_COLUMNS;

                let stmt = Query::select()
                    .columns(EVENT_COLUMNS)
                    .from(Events::Table)
                    .and_where(key_condition(key))
                    .to_owned();

                let (sql, values) = <$db_type>::build_select(&stmt);
                let row: Option<EventRow> = sqlx::query_as_with(&sql, values)
                    .fetch_optional(&self.pool)
                    .await?;

                row.ok_or_else(|| StorageError::NotFound(key.clone()))?
                    .into_record()
            }

            async fn list(
                &self,
                query: &crate::query::ListQuery,
            ) -> Result<crate::query::Page<EventRecord>> {
                use sea_query::{Asterisk, Order, Query};

                use crate::storage::schema::EVENT_COLUMNS;

                let condition = filter_condition(&query.filter);

                let count_stmt = Query::select()
                    .expr(Expr::col(Asterisk).count())
                    .from(Events::Table)
                    .cond_where(condition.clone())
                    .to_owned();

                let page_stmt = Query::select()
                    .columns(EVENT_COLUMNS)
                    .from(Events::Table)
                    .cond_where(condition)
                    .order_by(Events::Timestamp, Order::Desc)
                    .order_by(Events::Id, Order::Desc)
                    .limit(query.page.limit())
                    .offset(query.page.offset())
                    .to_owned();

                let (count_sql, count_values) = <$db_type>::build_select(&count_stmt);
                let (page_sql, page_values) = <$db_type>::build_select(&page_stmt);

                // Count and page read one snapshot.
                let mut tx = self.pool.begin().await?;
                if let Some(stmt) = <$db_type as SqlDatabase>::SNAPSHOT_READ {
                    sqlx::query(stmt).execute(&mut *tx).await?;
                }

                let total: i64 = sqlx::query_scalar_with(&count_sql, count_values)
                    .fetch_one(&mut *tx)
                    .await?;
                let total = total.max(0) as u64;

                let rows: Vec<EventRow> = if query.page.offset() < total {
                    sqlx::query_as_with(&page_sql, page_values)
                        .fetch_all(&mut *tx)
                        .await?
                } else {
                    Vec::new()
                };

                tx.commit().await?;

                let items = rows
                    .into_iter()
                    .map(EventRow::into_record)
                    .collect::<Result<Vec<_>>>()?;

                Ok(crate::query::Page {
                    items,
                    total,
                    page: query.page.page,
                    page_size: query.page.page_size,
                })
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_event_store!(super::postgres::Postgres, "postgres");
impl_event_store!(super::sqlite::Sqlite, "sqlite");
