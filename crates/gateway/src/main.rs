//! Refvest gateway service entry point.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use refvest_gateway::{
    ws, DryRunSubmitter, GatewayConfig, GatewayHandler, PayoutSubmitter, SolanaRpcSubmitter,
};
use refvest_ledger::{utc_plus_8, Ledger, LedgerConfig};
use refvest_price::{DexScreenerProvider, JupiterProvider, PriceResolver, QuoteProvider};
use refvest_settings::Settings;
use refvest_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings: Settings<GatewayConfig> = Settings::load_or_default("refvest", None)?;
    let config = settings.config.clone();
    info!("configuration loaded from {}", settings.path().display());

    if config.reward_mint.is_empty() {
        warn!("reward_mint is not configured; every report will be skipped");
    }
    if config.webhook_secret.is_none() {
        warn!("webhook_secret is not configured; ingestion is disabled");
    }

    let store = Arc::new(Store::open(Path::new(&config.db_path))?);

    let ledger_config = LedgerConfig {
        reward_mint: config.reward_mint.clone(),
        commission_rate_bps: config.commission_rate_bps,
        vesting_days: config.vesting_days,
        sweep_threshold: config.sweep_threshold,
        min_harvest: config.min_harvest,
        vesting_offset: FixedOffset::east_opt(config.vesting_offset_hours * 3600)
            .unwrap_or_else(|| {
                warn!(
                    hours = config.vesting_offset_hours,
                    "invalid vesting offset, using UTC+8"
                );
                utc_plus_8()
            }),
    };
    let ledger = Ledger::new(store, ledger_config);

    let providers: Vec<Box<dyn QuoteProvider>> = vec![
        Box::new(JupiterProvider::new(
            config.jupiter_base_url.clone(),
            config.reward_mint.clone(),
        )),
        Box::new(DexScreenerProvider::new(
            config.dexscreener_base_url.clone(),
            config.reward_mint.clone(),
        )),
    ];
    let resolver = Arc::new(PriceResolver::new(
        providers,
        config.fallback_price,
        Duration::from_millis(config.quote_timeout_ms),
    ));

    let submitter: Arc<dyn PayoutSubmitter> = match settlement_submitter(&config) {
        Some(submitter) => submitter,
        None => {
            warn!("no settlement RPC or treasury key configured, payouts run dry");
            Arc::new(DryRunSubmitter::new())
        }
    };

    let handler = Arc::new(GatewayHandler::new(ledger, resolver, submitter));
    ws::run_server(config.port, handler, config.webhook_secret.clone()).await?;
    Ok(())
}

/// Build the Solana submitter when both the RPC endpoint and the
/// treasury keypair are configured.
fn settlement_submitter(config: &GatewayConfig) -> Option<Arc<dyn PayoutSubmitter>> {
    let rpc_url = config.settlement_rpc_url.clone()?;
    let key_path = config.treasury_keypair_path.as_ref()?;

    let bytes = match std::fs::read(key_path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %key_path, error = %e, "failed to read treasury keypair");
            return None;
        }
    };
    let keypair: [u8; 64] = match bytes.as_slice().try_into() {
        Ok(k) => k,
        Err(_) => {
            warn!(path = %key_path, len = bytes.len(), "treasury keypair must be 64 bytes");
            return None;
        }
    };

    Some(Arc::new(SolanaRpcSubmitter::new(
        rpc_url,
        keypair,
        config.reward_mint.clone(),
    )))
}
