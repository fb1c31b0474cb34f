//! SQLite connection handling for the ledger.
//!
//! SQLite connections are cheap, so there is no pool: every batch window
//! opens its own connection and drops it when the window is done.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use thiserror::Error;

/// Diesel error type alias.
pub type DieselError = diesel::result::Error;

/// Ledger access failures. All of them are fatal to the current batch window.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Cannot open ledger at {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: diesel::ConnectionError,
    },

    #[error("Ledger query failed: {0}")]
    Query(#[from] DieselError),
}

/// Strip a `sqlite:` / `sqlite://` prefix so diesel gets a plain path.
pub fn normalize_url(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}

/// Open a connection with foreign keys enforced.
pub fn establish(database_url: &str) -> Result<SqliteConnection, LedgerError> {
    let url = normalize_url(database_url);
    let mut conn = SqliteConnection::establish(url).map_err(|source| LedgerError::Connection {
        url: url.to_string(),
        source,
    })?;
    conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
    Ok(conn)
}
