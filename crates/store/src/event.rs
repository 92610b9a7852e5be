//! Purchase events: the audit trail and the deduplication witness.

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::{Result, Store};

/// One on-chain purchase, immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseEventRow {
    pub signature: String,
    pub buyer: String,
    pub referrer: Option<String>,
    pub token_amount: u64,
    pub usd_value: u64,
    pub reward_amount: u64,
    pub created_at: i64,
}

impl Store {
    /// Record a purchase event and credit its referrer, atomically.
    ///
    /// The event insert is `INSERT OR IGNORE` against the signature
    /// primary key: a second delivery of the same signature changes zero
    /// rows and the whole call returns `false` without touching any
    /// balance. Insert and credit commit together, so there is no window
    /// in which an event exists uncredited or a credit exists unwitnessed.
    pub fn record_event_and_credit(&self, event: &PurchaseEventRow) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO purchase_events
             (signature, buyer, referrer, token_amount, usd_value, reward_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.signature,
                event.buyer,
                event.referrer,
                event.token_amount as i64,
                event.usd_value as i64,
                event.reward_amount as i64,
                event.created_at,
            ],
        )?;

        if inserted == 0 {
            debug!(signature = %event.signature, "duplicate purchase event, skipped");
            return Ok(false);
        }

        if let Some(ref referrer) = event.referrer {
            tx.execute(
                "INSERT OR IGNORE INTO accounts (wallet, last_vesting_time, created_at)
                 VALUES (?1, ?2, ?2)",
                params![referrer, event.created_at],
            )?;
            // Arithmetic happens in SQL: the read-modify-write is one
            // statement, serialized by SQLite against concurrent credits
            // and harvests.
            tx.execute(
                "UPDATE accounts
                 SET locked_reward = locked_reward + ?2,
                     total_earned  = total_earned + ?2,
                     team_volume   = team_volume + ?3,
                     month_volume  = month_volume + ?3
                 WHERE wallet = ?1",
                params![
                    referrer,
                    event.reward_amount as i64,
                    event.usd_value as i64
                ],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    pub fn get_event(&self, signature: &str) -> Result<Option<PurchaseEventRow>> {
        let row = self
            .conn()
            .query_row(
                "SELECT signature, buyer, referrer, token_amount, usd_value,
                        reward_amount, created_at
                 FROM purchase_events WHERE signature = ?1",
                params![signature],
                |r| {
                    Ok(PurchaseEventRow {
                        signature: r.get(0)?,
                        buyer: r.get(1)?,
                        referrer: r.get(2)?,
                        token_amount: r.get::<_, i64>(3)? as u64,
                        usd_value: r.get::<_, i64>(4)? as u64,
                        reward_amount: r.get::<_, i64>(5)? as u64,
                        created_at: r.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn event_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM purchase_events", [], |r| r.get(0))?;
        Ok(count as u64)
    }
}
