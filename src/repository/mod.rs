//! Repository layer for the transcription ledger.
//!
//! All database access uses Diesel on SQLite.

pub mod context;
pub mod ledger;
pub mod models;
pub mod pool;

pub use context::DbContext;
pub use ledger::{AssetRegistration, LedgerSession, OutputWithAsset, ReplacementUpdate, ScrubUpdate};
pub use pool::{DieselError, LedgerError};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
