//! Account rows: creation, referrer binding, and the harvest transaction.

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::{Result, Store};

/// One account per wallet address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub wallet: String,
    pub referrer: Option<String>,
    pub locked_reward: u64,
    pub total_earned: u64,
    pub team_volume: u64,
    pub month_volume: u64,
    pub last_vesting_time: i64,
    pub created_at: i64,
}

/// Result of a referrer bind write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindWrite {
    Bound,
    AlreadyBound,
}

/// One leaderboard entry (read view).
#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub wallet: String,
    pub referrals: u64,
    pub locked_reward: u64,
    pub total_earned: u64,
    pub team_volume: u64,
}

/// What the vesting policy decided to release, applied atomically by
/// [`Store::harvest`].
#[derive(Debug, Clone)]
pub struct HarvestDecision {
    pub release: u64,
    pub now: i64,
    pub reference: String,
}

/// Outcome of a harvest transaction. `Declined` carries the policy's
/// reason back out of the transaction unchanged.
#[derive(Debug)]
pub enum HarvestOutcome<E> {
    Applied { release: u64 },
    Declined(E),
    NoAccount,
}

impl Store {
    /// Create the account row if the wallet has never been seen.
    /// Returns `true` if a row was created.
    pub fn ensure_account(&self, wallet: &str, now: i64) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT OR IGNORE INTO accounts (wallet, last_vesting_time, created_at)
             VALUES (?1, ?2, ?2)",
            params![wallet, now],
        )?;
        Ok(changed == 1)
    }

    pub fn get_account(&self, wallet: &str) -> Result<Option<AccountRow>> {
        let row = self
            .conn()
            .query_row(
                "SELECT wallet, referrer, locked_reward, total_earned, team_volume,
                        month_volume, last_vesting_time, created_at
                 FROM accounts WHERE wallet = ?1",
                params![wallet],
                |r| {
                    Ok(AccountRow {
                        wallet: r.get(0)?,
                        referrer: r.get(1)?,
                        locked_reward: r.get::<_, i64>(2)? as u64,
                        total_earned: r.get::<_, i64>(3)? as u64,
                        team_volume: r.get::<_, i64>(4)? as u64,
                        month_volume: r.get::<_, i64>(5)? as u64,
                        last_vesting_time: r.get(6)?,
                        created_at: r.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Set the referrer, first bind wins.
    ///
    /// The NULL check happens inside the upsert itself, so two racing
    /// binds cannot both win: the second sees a non-NULL referrer and
    /// changes nothing.
    pub fn bind_referrer(&self, wallet: &str, referrer: &str, now: i64) -> Result<BindWrite> {
        let changed = self.conn().execute(
            "INSERT INTO accounts (wallet, referrer, last_vesting_time, created_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(wallet) DO UPDATE SET referrer = excluded.referrer
             WHERE accounts.referrer IS NULL",
            params![wallet, referrer, now],
        )?;
        if changed == 1 {
            debug!(wallet, referrer, "referrer bound");
            Ok(BindWrite::Bound)
        } else {
            Ok(BindWrite::AlreadyBound)
        }
    }

    /// Count of accounts that name `wallet` as their referrer. Derived,
    /// never stored.
    pub fn referrals_count(&self, wallet: &str) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM accounts WHERE referrer = ?1",
            params![wallet],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    /// Top accounts by referral count.
    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT a.wallet, COUNT(r.wallet) AS referrals, a.locked_reward,
                    a.total_earned, a.team_volume
             FROM accounts a
             LEFT JOIN accounts r ON r.referrer = a.wallet
             GROUP BY a.wallet
             ORDER BY referrals DESC, a.team_volume DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |r| {
                Ok(LeaderboardRow {
                    wallet: r.get(0)?,
                    referrals: r.get::<_, i64>(1)? as u64,
                    locked_reward: r.get::<_, i64>(2)? as u64,
                    total_earned: r.get::<_, i64>(3)? as u64,
                    team_volume: r.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Run one harvest as a single write transaction.
    ///
    /// The current balance and last release time are read inside the
    /// transaction, handed to `decide`, and the debit + withdrawal row are
    /// applied before commit - a commission credit racing this harvest
    /// either lands before the read or after the commit, never in between.
    pub fn harvest<E, F>(&self, wallet: &str, decide: F) -> Result<HarvestOutcome<E>>
    where
        F: FnOnce(u64, i64) -> std::result::Result<HarvestDecision, E>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let row = tx
            .query_row(
                "SELECT locked_reward, last_vesting_time FROM accounts WHERE wallet = ?1",
                params![wallet],
                |r| Ok((r.get::<_, i64>(0)? as u64, r.get::<_, i64>(1)?)),
            )
            .optional()?;

        let Some((locked, last_vesting_time)) = row else {
            return Ok(HarvestOutcome::NoAccount);
        };

        let decision = match decide(locked, last_vesting_time) {
            Ok(d) => d,
            Err(reason) => return Ok(HarvestOutcome::Declined(reason)),
        };

        tx.execute(
            "UPDATE accounts
             SET locked_reward = locked_reward - ?2, last_vesting_time = ?3
             WHERE wallet = ?1",
            params![wallet, decision.release as i64, decision.now],
        )?;
        tx.execute(
            "INSERT INTO withdrawals (wallet, amount, status, reference, created_at)
             VALUES (?1, ?2, 'pending', ?3, ?4)",
            params![
                wallet,
                decision.release as i64,
                decision.reference,
                decision.now
            ],
        )?;
        tx.commit()?;

        debug!(wallet, release = decision.release, "harvest applied");
        Ok(HarvestOutcome::Applied {
            release: decision.release,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The store treats wallets as opaque keys; tests only need distinct strings.
    fn wallet(n: u8) -> String {
        format!("wallet-{n}")
    }

    #[test]
    fn ensure_account_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.ensure_account(&wallet(1), 100).unwrap());
        assert!(!store.ensure_account(&wallet(1), 200).unwrap());

        let row = store.get_account(&wallet(1)).unwrap().unwrap();
        assert_eq!(row.created_at, 100);
        assert_eq!(row.locked_reward, 0);
    }

    #[test]
    fn first_bind_wins() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(
            store.bind_referrer(&wallet(1), &wallet(2), 100).unwrap(),
            BindWrite::Bound
        );
        assert_eq!(
            store.bind_referrer(&wallet(1), &wallet(3), 200).unwrap(),
            BindWrite::AlreadyBound
        );

        let row = store.get_account(&wallet(1)).unwrap().unwrap();
        assert_eq!(row.referrer.as_deref(), Some(wallet(2).as_str()));
    }

    #[test]
    fn bind_after_plain_registration() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_account(&wallet(1), 50).unwrap();
        assert_eq!(
            store.bind_referrer(&wallet(1), &wallet(2), 100).unwrap(),
            BindWrite::Bound
        );
    }

    #[test]
    fn referrals_count_is_derived() {
        let store = Store::open_in_memory().unwrap();
        store.bind_referrer(&wallet(1), &wallet(9), 1).unwrap();
        store.bind_referrer(&wallet(2), &wallet(9), 2).unwrap();
        store.bind_referrer(&wallet(3), &wallet(8), 3).unwrap();

        assert_eq!(store.referrals_count(&wallet(9)).unwrap(), 2);
        assert_eq!(store.referrals_count(&wallet(8)).unwrap(), 1);
        assert_eq!(store.referrals_count(&wallet(1)).unwrap(), 0);
    }

    #[test]
    fn harvest_applies_decision() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_account(&wallet(1), 0).unwrap();
        store
            .conn()
            .execute(
                "UPDATE accounts SET locked_reward = 500 WHERE wallet = ?1",
                rusqlite::params![wallet(1)],
            )
            .unwrap();

        let outcome = store
            .harvest(&wallet(1), |locked, last| {
                assert_eq!(locked, 500);
                assert_eq!(last, 0);
                Ok::<_, ()>(HarvestDecision {
                    release: 200,
                    now: 86_400,
                    reference: "wd-test".into(),
                })
            })
            .unwrap();
        assert!(matches!(outcome, HarvestOutcome::Applied { release: 200 }));

        let row = store.get_account(&wallet(1)).unwrap().unwrap();
        assert_eq!(row.locked_reward, 300);
        assert_eq!(row.last_vesting_time, 86_400);

        let withdrawals = store.withdrawals_for(&wallet(1)).unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].amount, 200);
        assert_eq!(withdrawals[0].status, "pending");
    }

    #[test]
    fn harvest_declined_changes_nothing() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_account(&wallet(1), 0).unwrap();

        let outcome = store
            .harvest(&wallet(1), |_, _| Err("not yet"))
            .unwrap();
        assert!(matches!(outcome, HarvestOutcome::Declined("not yet")));
        assert!(store.withdrawals_for(&wallet(1)).unwrap().is_empty());
    }

    #[test]
    fn harvest_unknown_wallet() {
        let store = Store::open_in_memory().unwrap();
        let outcome = store
            .harvest(&wallet(7), |_, _| {
                Err::<HarvestDecision, ()>(unreachable!("no row to decide on"))
            })
            .unwrap();
        assert!(matches!(outcome, HarvestOutcome::NoAccount));
    }

    #[test]
    fn leaderboard_orders_by_referrals() {
        let store = Store::open_in_memory().unwrap();
        store.bind_referrer(&wallet(1), &wallet(9), 1).unwrap();
        store.bind_referrer(&wallet(2), &wallet(9), 2).unwrap();
        store.bind_referrer(&wallet(3), &wallet(8), 3).unwrap();

        let rows = store.leaderboard(10).unwrap();
        assert_eq!(rows[0].wallet, wallet(9));
        assert_eq!(rows[0].referrals, 2);
    }
}
