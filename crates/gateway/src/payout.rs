//! Payout submitter seam.
//!
//! Settlement of a harvested release (building and sending the actual
//! token transfer) belongs to an external collaborator. The gateway only
//! hands the approved amount across this trait and records the outcome
//! on the withdrawal row.

use std::sync::Mutex;

use tracing::info;

use refvest_core::TOKEN_DECIMALS;

/// Result of handing a payout to settlement.
#[derive(Debug, Clone)]
pub struct SubmitResult {
    /// Transaction signature or submission identifier.
    pub signature: String,
    /// Whether the transfer was confirmed at submission time.
    pub confirmed: bool,
}

/// Trait for submitting approved payouts to a settlement layer.
#[async_trait::async_trait]
pub trait PayoutSubmitter: Send + Sync {
    async fn submit(
        &self,
        wallet: &str,
        amount: u64,
        reference: &str,
    ) -> Result<SubmitResult, String>;
}

/// Records submissions without touching a chain. Used in tests and as
/// the default when no RPC endpoint is configured.
#[derive(Default)]
pub struct DryRunSubmitter {
    submissions: Mutex<Vec<(String, u64, String)>>,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<(String, u64, String)> {
        self.submissions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl PayoutSubmitter for DryRunSubmitter {
    async fn submit(
        &self,
        wallet: &str,
        amount: u64,
        reference: &str,
    ) -> Result<SubmitResult, String> {
        self.submissions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((wallet.to_string(), amount, reference.to_string()));
        info!(wallet, amount, reference, "dry-run payout recorded");
        Ok(SubmitResult {
            signature: format!("dry-run-{reference}"),
            confirmed: true,
        })
    }
}

/// Solana RPC-based payout submitter.
pub struct SolanaRpcSubmitter {
    rpc_url: String,
    /// Treasury keypair bytes (ed25519, 64 bytes: secret + public).
    #[allow(dead_code)]
    keypair_bytes: [u8; 64],
    /// Reward token mint.
    mint: String,
}

impl SolanaRpcSubmitter {
    pub fn new(rpc_url: String, keypair_bytes: [u8; 64], mint: String) -> Self {
        Self {
            rpc_url,
            keypair_bytes,
            mint,
        }
    }
}

#[async_trait::async_trait]
impl PayoutSubmitter for SolanaRpcSubmitter {
    async fn submit(
        &self,
        wallet: &str,
        amount: u64,
        reference: &str,
    ) -> Result<SubmitResult, String> {
        // In production this would:
        // 1. Derive the treasury and recipient associated token accounts
        // 2. Build an SPL transfer of `amount` base units (the mint uses
        //    TOKEN_DECIMALS) signed by the treasury keypair
        // 3. Send via sendTransaction and confirm via getSignatureStatuses
        //
        // The transfer construction needs solana-sdk, which stays outside
        // this workspace; the ledger's contract ends at the approved
        // amount and the withdrawal reference.
        info!(
            rpc_url = %self.rpc_url,
            mint = %self.mint,
            wallet,
            amount,
            decimals = TOKEN_DECIMALS,
            reference,
            "would submit payout transaction to Solana RPC"
        );
        Ok(SubmitResult {
            signature: format!("rpc-{reference}"),
            confirmed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_records_submissions() {
        let submitter = DryRunSubmitter::new();
        let result = submitter.submit("wallet-1", 500, "wd-1").await.unwrap();
        assert!(result.confirmed);
        assert_eq!(
            submitter.submissions(),
            vec![("wallet-1".to_string(), 500, "wd-1".to_string())]
        );
    }
}
