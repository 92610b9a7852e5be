//! Referral binding with signature-authenticated proofs.
//!
//! The bind proof is the sole authenticity control on the referral tree:
//! without it any caller could attribute arbitrary referrers and capture
//! their commissions.

use ed25519_dalek::{Signature, VerifyingKey};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use refvest_core::WalletAddr;
use refvest_store::{BindWrite, StoreError};

use crate::Ledger;

/// A bind request as received from the wallet owner.
///
/// `signature` is the wallet's ed25519 signature over the exact bytes of
/// `message`, base58-encoded as wallets produce it.
#[derive(Debug, Clone, Deserialize)]
pub struct BindRequest {
    pub wallet: String,
    pub referrer: String,
    pub message: String,
    pub signature: String,
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("malformed address: {0}")]
    MalformedAddress(#[from] refvest_core::AddrError),
    #[error("cannot bind your own wallet as referrer")]
    SelfReferral,
    #[error("bind proof did not verify")]
    InvalidProof,
    #[error("a referrer is already bound")]
    AlreadyBound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Ledger {
    /// Bind `referrer` to `wallet`, once and forever.
    pub fn bind(&self, req: &BindRequest, now: i64) -> Result<(), BindError> {
        let wallet = WalletAddr::parse(&req.wallet)?;
        let referrer = WalletAddr::parse(&req.referrer)?;

        if wallet == referrer {
            return Err(BindError::SelfReferral);
        }

        verify_bind_proof(&wallet, &referrer, &req.message, &req.signature)?;

        match self
            .store()
            .bind_referrer(wallet.as_str(), referrer.as_str(), now)?
        {
            BindWrite::Bound => {
                info!(wallet = %wallet, referrer = %referrer, "referrer bound");
                Ok(())
            }
            BindWrite::AlreadyBound => Err(BindError::AlreadyBound),
        }
    }
}

/// Verify the wallet's signature over the bind message.
///
/// The message must name both addresses; a valid signature over some
/// unrelated text must not bind a pair the signer never saw.
fn verify_bind_proof(
    wallet: &WalletAddr,
    referrer: &WalletAddr,
    message: &str,
    signature: &str,
) -> Result<(), BindError> {
    if !message.contains(wallet.as_str()) || !message.contains(referrer.as_str()) {
        warn!(wallet = %wallet, "bind message does not name the bound pair");
        return Err(BindError::InvalidProof);
    }

    let sig_bytes = bs58::decode(signature)
        .into_vec()
        .map_err(|_| BindError::InvalidProof)?;
    let sig_bytes: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| BindError::InvalidProof)?;
    let signature = Signature::from_bytes(&sig_bytes);

    let verifying_key =
        VerifyingKey::from_bytes(&wallet.to_bytes()).map_err(|_| BindError::InvalidProof)?;

    verifying_key
        .verify_strict(message.as_bytes(), &signature)
        .map_err(|_| {
            warn!(wallet = %wallet, "bind proof verification failed");
            BindError::InvalidProof
        })
}
