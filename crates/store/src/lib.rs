//! Refvest Store
//!
//! SQLite persistence for the vesting ledger: accounts, purchase events,
//! and withdrawals. The account row is the only shared mutable resource in
//! the system, so every balance mutation here is a single SQL statement or
//! a single transaction - callers never get a read-then-write seam to race
//! through.

pub mod account;
pub mod event;
pub mod schema;
pub mod withdrawal;

pub use account::{AccountRow, BindWrite, HarvestDecision, HarvestOutcome, LeaderboardRow};
pub use event::PurchaseEventRow;
pub use withdrawal::WithdrawalRow;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),
    #[error("Store busy, retry")]
    Busy,
    #[error("Store error: {0}")]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy)
            | Some(rusqlite::ErrorCode::DatabaseLocked) => StoreError::Busy,
            _ => StoreError::Sqlite(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle to the ledger database.
///
/// The connection sits behind a mutex; statement-level atomicity comes
/// from SQLite itself, the mutex only serializes access to the handle.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (and migrate) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Open(e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| StoreError::Open(e.to_string()))?;
        schema::create_tables(&conn)?;
        info!("ledger store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        schema::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.sqlite");

        {
            let store = Store::open(&path).unwrap();
            store.ensure_account("wallet-1", 100).unwrap();
            store.bind_referrer("wallet-2", "wallet-1", 200).unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert!(store.get_account("wallet-1").unwrap().is_some());
        assert_eq!(store.referrals_count("wallet-1").unwrap(), 1);
    }
}
