//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Events table schema.
#[derive(Iden, Clone, Copy)]
pub enum Events {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "event_id"]
    EventId,
    #[iden = "project_id"]
    ProjectId,
    #[iden = "timestamp"]
    Timestamp,
    #[iden = "searchable_strings"]
    SearchableStrings,
    #[iden = "event"]
    Event,
}

/// Columns selected when reading full records.
pub const EVENT_COLUMNS: [Events; 6] = [
    Events::Id,
    Events::EventId,
    Events::ProjectId,
    Events::Timestamp,
    Events::SearchableStrings,
    Events::Event,
];

/// SQLite DDL for the events table, one statement per entry.
pub const SQLITE_CREATE_EVENTS: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    project_id INTEGER NOT NULL,
    "timestamp" TEXT NOT NULL,
    searchable_strings TEXT NOT NULL,
    event TEXT NOT NULL
)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_project_id ON events(project_id)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events("timestamp")"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_searchable_strings ON events(searchable_strings)"#,
];

/// PostgreSQL DDL for the events table, one statement per entry.
///
/// Substring search uses a trigram GIN index; a btree index would reject
/// long `searchable_strings` values and cannot serve `LIKE '%term%'`.
pub const POSTGRES_CREATE_EVENTS: &[&str] = &[
    r#"CREATE EXTENSION IF NOT EXISTS pg_trgm"#,
    r#"
CREATE TABLE IF NOT EXISTS events (
    id BIGSERIAL PRIMARY KEY,
    event_id TEXT NOT NULL UNIQUE,
    project_id BIGINT NOT NULL,
    "timestamp" TEXT NOT NULL,
    searchable_strings TEXT NOT NULL,
    event TEXT NOT NULL
)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_project_id ON events(project_id)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events("timestamp")"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_searchable_strings ON events USING gin (searchable_strings gin_trgm_ops)"#,
];
