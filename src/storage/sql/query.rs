//! SQL database abstraction trait.

use sea_query_binder::SqlxValues;

/// Trait for SQL database backends.
///
/// This trait abstracts over different SQL databases (PostgreSQL, SQLite)
/// by providing the pool type, the schema DDL and query building methods.
/// Built queries carry their values as bind parameters.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync;

    /// DDL creating the events table and its indexes, one statement each.
    const SCHEMA: &'static [&'static str];

    /// Statement run first in a read transaction so every query in it sees
    /// one snapshot. `None` when the backend already behaves that way.
    const SNAPSHOT_READ: Option<&'static str>;

    /// Build SQL and bind values from a sea-query SELECT statement.
    fn build_select(stmt: &sea_query::SelectStatement) -> (String, SqlxValues);

    /// Build SQL and bind values from a sea-query INSERT statement.
    fn build_insert(stmt: &sea_query::InsertStatement) -> (String, SqlxValues);
}
