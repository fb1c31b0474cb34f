//! Database context: the entry point the CLI uses to reach the ledger.

use super::ledger::LedgerSession;
use super::pool::{normalize_url, LedgerError};

/// Holds the ledger location and hands out sessions.
///
/// Nothing stays open between calls; each [`session`](Self::session) opens
/// a fresh connection owned by the caller.
#[derive(Debug, Clone)]
pub struct DbContext {
    database_url: String,
}

impl DbContext {
    /// Create a context from a database URL or file path.
    pub fn from_url(url: &str) -> Self {
        Self {
            database_url: normalize_url(url).to_string(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Open a new session.
    pub fn session(&self) -> Result<LedgerSession, LedgerError> {
        LedgerSession::open(&self.database_url)
    }

    /// Initialize database schema.
    pub fn install_schema(&self) -> Result<(), LedgerError> {
        self.session()?.install_schema()
    }

    pub fn drop_schema(&self) -> Result<(), LedgerError> {
        self.session()?.drop_schema()
    }
}
