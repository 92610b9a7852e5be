//! Upstream purchase reports.
//!
//! The indexing service delivers loosely-typed JSON; everything here is
//! about turning one report into a `ValidPurchase` or a typed reject
//! before any state is touched. One bad report never fails its batch.

use serde::Deserialize;

use refvest_core::{token_units_from_ui, WalletAddr};

/// One raw report from the indexer webhook, in the indexer's field names.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseReport {
    pub signature: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "feePayer")]
    pub fee_payer: String,
    #[serde(default, rename = "transactionError")]
    pub transaction_error: Option<serde_json::Value>,
    #[serde(default, rename = "tokenTransfers")]
    pub token_transfers: Vec<TokenTransfer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenTransfer {
    pub mint: String,
    #[serde(rename = "toUserAccount")]
    pub to_user_account: String,
    #[serde(rename = "tokenAmount")]
    pub token_amount: f64,
}

/// A report that passed validation: the buyer received a positive amount
/// of the reward token in a successful swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPurchase {
    pub signature: String,
    pub buyer: WalletAddr,
    pub token_units: u64,
}

/// Why a report was not attributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportReject {
    /// Not a swap, or the transaction failed on-chain.
    NotAPurchase,
    /// No transfer of the reward mint to the buyer.
    NoRewardTransfer,
    /// Buyer field is not a wallet address.
    MalformedBuyer,
    /// Transfer amount is zero, negative, or not a number. Still recorded
    /// (zero-credit) as an audit witness against the signature.
    NonPositiveAmount,
}

/// Validate one report against the reward mint.
pub fn validate_report(
    report: &PurchaseReport,
    reward_mint: &str,
) -> Result<ValidPurchase, ReportReject> {
    if report.kind != "SWAP" || report.transaction_error.is_some() {
        return Err(ReportReject::NotAPurchase);
    }

    let buyer = WalletAddr::parse(&report.fee_payer).map_err(|_| ReportReject::MalformedBuyer)?;

    let received = report
        .token_transfers
        .iter()
        .find(|t| t.mint == reward_mint && t.to_user_account == report.fee_payer)
        .ok_or(ReportReject::NoRewardTransfer)?;

    let token_units = match token_units_from_ui(received.token_amount) {
        Some(units) if units > 0 => units,
        _ => return Err(ReportReject::NonPositiveAmount),
    };

    Ok(ValidPurchase {
        signature: report.signature.clone(),
        buyer,
        token_units,
    })
}
