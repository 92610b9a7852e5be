//! Gateway configuration, persisted via `refvest-settings`.

use serde::{Deserialize, Serialize};

use refvest_core::{COMMISSION_RATE_BPS, TOKEN_ONE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket listen port.
    pub port: u16,
    /// Shared secret the indexer must present as `?secret=` to ingest.
    pub webhook_secret: Option<String>,
    /// Reward token mint address.
    pub reward_mint: String,
    /// Ordered quote sources.
    pub jupiter_base_url: String,
    pub dexscreener_base_url: String,
    /// Price used when every quote source fails.
    pub fallback_price: f64,
    /// Per-provider quote timeout in milliseconds.
    pub quote_timeout_ms: u64,
    /// Referrer commission in basis points.
    pub commission_rate_bps: u64,
    /// Linear vesting horizon in days.
    pub vesting_days: u32,
    /// Sweep-whole threshold in token base units.
    pub sweep_threshold: u64,
    /// Minimum harvest in token base units.
    pub min_harvest: u64,
    /// Vesting day boundary offset from UTC, in hours.
    pub vesting_offset_hours: i32,
    /// SQLite database path.
    pub db_path: String,
    /// Solana RPC endpoint for payout settlement; dry-run when unset.
    pub settlement_rpc_url: Option<String>,
    /// Path to the 64-byte treasury keypair file.
    pub treasury_keypair_path: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 9750,
            webhook_secret: None,
            reward_mint: String::new(),
            jupiter_base_url: "https://api.jup.ag".to_string(),
            dexscreener_base_url: "https://api.dexscreener.com".to_string(),
            fallback_price: 0.002,
            quote_timeout_ms: 2_000,
            commission_rate_bps: COMMISSION_RATE_BPS,
            vesting_days: 14,
            sweep_threshold: 10 * TOKEN_ONE,
            min_harvest: TOKEN_ONE / 10,
            vesting_offset_hours: 8,
            db_path: "refvest.sqlite".to_string(),
            settlement_rpc_url: None,
            treasury_keypair_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roundtrips_through_json() {
        let config = GatewayConfig::default();
        let text = serde_json::to_string_pretty(&config).unwrap();
        let back: GatewayConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.port, config.port);
        assert_eq!(back.vesting_days, 14);
        assert_eq!(back.vesting_offset_hours, 8);
    }
}
