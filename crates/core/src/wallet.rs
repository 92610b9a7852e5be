//! Validated wallet addresses.
//!
//! Addresses are base58-encoded 32-byte ed25519 public keys. They are
//! opaque identifiers everywhere except the referral binder, which needs
//! the decoded key bytes to verify bind proofs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddrError {
    #[error("address is not valid base58")]
    NotBase58,
    #[error("address decodes to {0} bytes, expected 32")]
    BadLength(usize),
}

/// A validated wallet address.
///
/// Construction goes through [`WalletAddr::parse`], including serde
/// deserialization, so a held value is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddr(String);

impl WalletAddr {
    pub fn parse(s: &str) -> Result<Self, AddrError> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|_| AddrError::NotBase58)?;
        if decoded.len() != 32 {
            return Err(AddrError::BadLength(decoded.len()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decoded 32-byte public key.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // Validated at construction, so the decode cannot fail here.
        if let Ok(decoded) = bs58::decode(&self.0).into_vec() {
            if decoded.len() == 32 {
                out.copy_from_slice(&decoded);
            }
        }
        out
    }

    /// Build an address from raw public key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(bs58::encode(bytes).into_string())
    }
}

impl std::fmt::Display for WalletAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WalletAddr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WalletAddr {
    type Error = AddrError;

    fn try_from(s: String) -> Result<Self, AddrError> {
        WalletAddr::parse(&s)
    }
}

impl From<WalletAddr> for String {
    fn from(addr: WalletAddr) -> String {
        addr.0
    }
}
