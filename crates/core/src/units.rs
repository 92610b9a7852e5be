//! Fixed-point amount units and commission arithmetic.
//!
//! Token amounts are stored in base units (4 decimals); USD values in
//! micro-USD (6 decimals). All ledger math is integer math with u128
//! intermediates so concurrent accumulators never see rounding drift.

/// Reward token decimals.
pub const TOKEN_DECIMALS: u8 = 4;

/// One whole token in base units.
pub const TOKEN_ONE: u64 = 10_000;

/// USD value decimals (micro-USD).
pub const USD_DECIMALS: u8 = 6;

/// One USD in micro-USD.
pub const USD_ONE: u64 = 1_000_000;

/// Default referrer commission in basis points (500 BPS = 5%).
pub const COMMISSION_RATE_BPS: u64 = 500;

/// Maximum permitted commission rate in basis points (50%).
pub const MAX_COMMISSION_RATE_BPS: u64 = 5_000;

/// Basis points denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Commission owed to a referrer for a purchase of `token_amount` base units.
///
/// # Panics
/// Panics if `rate_bps > MAX_COMMISSION_RATE_BPS`.
pub fn calculate_commission(token_amount: u64, rate_bps: u64) -> u64 {
    assert!(
        rate_bps <= MAX_COMMISSION_RATE_BPS,
        "rate_bps {} exceeds max {}",
        rate_bps,
        MAX_COMMISSION_RATE_BPS
    );
    let raw = (token_amount as u128).saturating_mul(rate_bps as u128) / BPS_DENOMINATOR as u128;
    raw.min(u64::MAX as u128) as u64
}

/// Convert an upstream decimal token amount to base units.
///
/// Returns `None` for non-finite, negative, or overflowing inputs -
/// upstream reports are untrusted.
pub fn token_units_from_ui(amount: f64) -> Option<u64> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let units = amount * TOKEN_ONE as f64;
    if units > u64::MAX as f64 {
        return None;
    }
    Some(units.round() as u64)
}

/// USD value of `token_units` base units at `price` USD per whole token,
/// in micro-USD.
pub fn usd_value(token_units: u64, price: f64) -> u64 {
    if !price.is_finite() || price <= 0.0 {
        return 0;
    }
    let usd = token_units as f64 / TOKEN_ONE as f64 * price * USD_ONE as f64;
    if usd >= u64::MAX as f64 {
        u64::MAX
    } else {
        usd.round() as u64
    }
}
