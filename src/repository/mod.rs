//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite with compile-time query
//! checking.

pub mod context;
pub mod document;
pub mod models;
pub mod pool;
pub mod util;

pub use context::DbContext;
pub use document::DocumentRepository;
pub use models::{DocumentRecord, NewDocument};
pub use pool::{AsyncSqlitePool, DieselError};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
