//! Linear vesting with calendar-day gating.
//!
//! Release is gated on the calendar date in a fixed offset, not elapsed
//! hours: a harvest at 23:59 and the next at 00:01 are one vesting day
//! apart. Small balances are swept whole so dust below the harvest floor
//! cannot become permanently unharvestable.

use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tracing::info;

use refvest_store::{HarvestDecision, HarvestOutcome, StoreError};

use crate::{Ledger, LedgerConfig};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("nothing to release yet")]
    NothingToRelease,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A successful harvest: the amount debited and the withdrawal reference
/// handed to settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Released {
    pub amount: u64,
    pub reference: String,
}

/// Whole vesting days between two instants: the difference of their
/// calendar dates in `offset`, not of their wall-clock distance.
pub fn vesting_days_between(last: i64, now: i64, offset: FixedOffset) -> i64 {
    match (local_date(last, offset), local_date(now, offset)) {
        (Some(a), Some(b)) => (b - a).num_days(),
        _ => 0,
    }
}

fn local_date(ts: i64, offset: FixedOffset) -> Option<chrono::NaiveDate> {
    Some(DateTime::from_timestamp(ts, 0)?.with_timezone(&offset).date_naive())
}

/// The release policy, pure so every branch is testable.
///
/// `None` means nothing to release: no day boundary crossed, an empty
/// pool, or a slice below the harvest floor.
pub fn compute_release(locked: u64, days_passed: i64, config: &LedgerConfig) -> Option<u64> {
    if days_passed < 1 || locked == 0 {
        return None;
    }

    let release = if locked <= config.sweep_threshold {
        // Sweep: release the whole small balance at once.
        locked
    } else {
        let share = (locked as u128).saturating_mul(days_passed as u128)
            / config.vesting_days.max(1) as u128;
        share.min(locked as u128) as u64
    };

    if release < config.min_harvest {
        return None;
    }
    Some(release)
}

impl Ledger {
    /// Release whatever has vested for `wallet` as of `now`.
    ///
    /// On success the locked balance is debited, `last_vesting_time`
    /// advances to `now`, and a pending withdrawal row records the
    /// handoff to settlement. `total_earned` is untouched: it was
    /// counted when the commission was credited.
    pub fn harvest(&self, wallet: &str, now: i64) -> Result<Released, HarvestError> {
        let config = self.config().clone();
        let reference = withdrawal_reference(wallet, now);
        let decision_reference = reference.clone();

        let outcome = self.store().harvest(wallet, move |locked, last_vesting_time| {
            let days = vesting_days_between(last_vesting_time, now, config.vesting_offset);
            match compute_release(locked, days, &config) {
                Some(release) => Ok(HarvestDecision {
                    release,
                    now,
                    reference: decision_reference,
                }),
                None => Err(HarvestError::NothingToRelease),
            }
        })?;

        match outcome {
            HarvestOutcome::Applied { release } => {
                info!(wallet, release, reference = %reference, "harvest released");
                Ok(Released {
                    amount: release,
                    reference,
                })
            }
            HarvestOutcome::Declined(reason) => Err(reason),
            HarvestOutcome::NoAccount => Err(HarvestError::NothingToRelease),
        }
    }
}

fn withdrawal_reference(wallet: &str, now: i64) -> String {
    let prefix: String = wallet.chars().take(8).collect();
    format!("wd-{prefix}-{now}")
}
