//! Refvest Gateway
//!
//! The external-facing edge of the ledger: a WebSocket JSON-RPC server
//! carrying the ingestion, claim, and bind endpoints, plus the payout
//! submitter seam that hands approved releases to on-chain settlement.

pub mod config;
pub mod handler;
pub mod payout;
pub mod protocol;
pub mod ws;

pub use config::GatewayConfig;
pub use handler::GatewayHandler;
pub use payout::{DryRunSubmitter, PayoutSubmitter, SolanaRpcSubmitter, SubmitResult};
pub use protocol::{RpcError, RpcRequest, RpcResponse};
