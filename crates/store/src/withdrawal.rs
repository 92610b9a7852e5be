//! Withdrawal rows: append-only record of harvest settlements.

use rusqlite::params;

use crate::{Result, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRow {
    pub id: i64,
    pub wallet: String,
    pub amount: u64,
    pub status: String,
    pub reference: String,
    pub created_at: i64,
}

impl Store {
    /// Update the settlement status of a withdrawal by reference.
    /// The amount and wallet are never rewritten.
    pub fn set_withdrawal_status(&self, reference: &str, status: &str) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE withdrawals SET status = ?2 WHERE reference = ?1",
            params![reference, status],
        )?;
        Ok(changed > 0)
    }

    pub fn withdrawals_for(&self, wallet: &str) -> Result<Vec<WithdrawalRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, wallet, amount, status, reference, created_at
             FROM withdrawals WHERE wallet = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![wallet], |r| {
                Ok(WithdrawalRow {
                    id: r.get(0)?,
                    wallet: r.get(1)?,
                    amount: r.get::<_, i64>(2)? as u64,
                    status: r.get(3)?,
                    reference: r.get(4)?,
                    created_at: r.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
