//! Table definitions.

use rusqlite::Connection;

/// Create the ledger tables.
///
/// `purchase_events.signature` is the primary key: the unique constraint
/// is the idempotency mechanism for ingestion, not an optimization.
pub fn create_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            wallet            TEXT PRIMARY KEY,
            referrer          TEXT,
            locked_reward     INTEGER NOT NULL DEFAULT 0,
            total_earned      INTEGER NOT NULL DEFAULT 0,
            team_volume       INTEGER NOT NULL DEFAULT 0,
            month_volume      INTEGER NOT NULL DEFAULT 0,
            last_vesting_time INTEGER NOT NULL,
            created_at        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_accounts_referrer ON accounts(referrer);

        CREATE TABLE IF NOT EXISTS purchase_events (
            signature     TEXT PRIMARY KEY,
            buyer         TEXT NOT NULL,
            referrer      TEXT,
            token_amount  INTEGER NOT NULL,
            usd_value     INTEGER NOT NULL,
            reward_amount INTEGER NOT NULL,
            created_at    INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS withdrawals (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            wallet     TEXT NOT NULL,
            amount     INTEGER NOT NULL,
            status     TEXT NOT NULL,
            reference  TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_withdrawals_wallet ON withdrawals(wallet);",
    )
}
