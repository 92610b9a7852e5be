//! Refvest Core
//!
//! Shared types and arithmetic for the referral vesting ledger:
//! validated wallet addresses, fixed-point amount units, and the
//! commission calculation used by the attribution engine.

pub mod units;
pub mod wallet;

pub use units::*;
pub use wallet::{AddrError, WalletAddr};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
