//! Refvest Ledger
//!
//! The commission attribution and vesting core: binds referrers,
//! ingests deduplicated purchase events, credits commissions, and
//! releases locked rewards against a day-gated linear vesting schedule.

pub mod attribution;
pub mod binder;
pub mod event;
pub mod vesting;

#[cfg(test)]
mod tests;

pub use attribution::BatchSummary;
pub use binder::{BindError, BindRequest};
pub use event::{PurchaseReport, TokenTransfer, ValidPurchase};
pub use vesting::{HarvestError, Released};

use std::sync::Arc;

use chrono::FixedOffset;
use refvest_core::{COMMISSION_RATE_BPS, TOKEN_ONE};
use refvest_store::Store;

/// Vesting and attribution policy knobs.
///
/// The source program's history carries several mutually inconsistent
/// vesting variants; these are configuration on purpose, with the
/// accumulated-days linear model as the default.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Mint address of the reward token; purchases of anything else are skipped.
    pub reward_mint: String,
    /// Referrer commission, basis points of the purchased token amount.
    pub commission_rate_bps: u64,
    /// Linear vesting horizon in days.
    pub vesting_days: u32,
    /// Balances at or below this are released whole (base units).
    pub sweep_threshold: u64,
    /// Smallest release worth paying out (base units).
    pub min_harvest: u64,
    /// Offset whose calendar dates gate harvests.
    pub vesting_offset: FixedOffset,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reward_mint: String::new(),
            commission_rate_bps: COMMISSION_RATE_BPS,
            vesting_days: 14,
            sweep_threshold: 10 * TOKEN_ONE,
            min_harvest: TOKEN_ONE / 10,
            vesting_offset: utc_plus_8(),
        }
    }
}

/// UTC+8, the offset whose midnight gates vesting days.
pub fn utc_plus_8() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset")
}

/// The attribution and vesting engine. Cheap to clone per request; all
/// mutable state lives in the store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<Store>,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(store: Arc<Store>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}
