//! Method dispatch: translates JSON-RPC calls into ledger operations and
//! ledger outcomes into JSON-RPC results or typed error codes.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use refvest_core::{unix_now, WalletAddr};
use refvest_ledger::{BindError, BindRequest, HarvestError, Ledger};
use refvest_price::PriceResolver;
use refvest_store::StoreError;

use crate::payout::PayoutSubmitter;
use crate::protocol::{code, RpcError};

pub struct GatewayHandler {
    ledger: Ledger,
    resolver: Arc<PriceResolver>,
    submitter: Arc<dyn PayoutSubmitter>,
}

impl GatewayHandler {
    pub fn new(
        ledger: Ledger,
        resolver: Arc<PriceResolver>,
        submitter: Arc<dyn PayoutSubmitter>,
    ) -> Self {
        Self {
            ledger,
            resolver,
            submitter,
        }
    }

    /// Handle one request. `privileged` is true when the connection
    /// presented the ingestion shared secret at the handshake.
    pub async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        privileged: bool,
    ) -> Result<Value, RpcError> {
        match method {
            "ingest.batch" => self.ingest_batch(params, privileged).await,
            "referral.bind" => self.bind(params),
            "claim.harvest" => self.claim(params).await,
            "account.register" => self.register(params),
            "account.summary" => self.summary(params),
            "leaderboard.top" => self.leaderboard(params),
            _ => Err(rpc_err(
                code::METHOD_NOT_FOUND,
                format!("unknown method: {method}"),
            )),
        }
    }

    /// Ingestion endpoint: one price snapshot for the whole batch, then
    /// per-event processing. Per-event failures are counted, never
    /// surfaced as a request failure.
    async fn ingest_batch(
        &self,
        params: Option<Value>,
        privileged: bool,
    ) -> Result<Value, RpcError> {
        if !privileged {
            return Err(rpc_err(
                code::UNAUTHORIZED,
                "ingestion requires the shared secret".into(),
            ));
        }
        let Some(Value::Array(reports)) = params else {
            return Err(rpc_err(
                code::INVALID_PARAMS,
                "expected an array of purchase reports".into(),
            ));
        };

        let price = self.resolver.resolve().await;
        let summary = self.ledger.process_batch(&reports, price, unix_now());
        Ok(json!(summary))
    }

    fn bind(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let req: BindRequest = parse_params(params)?;
        match self.ledger.bind(&req, unix_now()) {
            Ok(()) => Ok(json!({ "bound": true })),
            Err(e @ (BindError::MalformedAddress(_) | BindError::SelfReferral)) => {
                Err(rpc_err(code::INVALID_PARAMS, e.to_string()))
            }
            Err(e @ BindError::InvalidProof) => Err(rpc_err(code::UNAUTHORIZED, e.to_string())),
            Err(e @ BindError::AlreadyBound) => Err(rpc_err(code::CONFLICT, e.to_string())),
            Err(BindError::Store(e)) => Err(store_err(e)),
        }
    }

    async fn claim(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let wallet = wallet_param(params)?;
        let released = match self.ledger.harvest(wallet.as_str(), unix_now()) {
            Ok(released) => released,
            Err(e @ HarvestError::NothingToRelease) => {
                return Err(rpc_err(code::DECLINED, e.to_string()))
            }
            Err(HarvestError::Store(e)) => return Err(store_err(e)),
        };

        // The debit is committed; settlement is the collaborator's
        // problem from here. A failed handoff flips the withdrawal row,
        // it does not resurrect the locked balance.
        match self
            .submitter
            .submit(wallet.as_str(), released.amount, &released.reference)
            .await
        {
            Ok(result) if result.confirmed => {
                self.set_withdrawal_status(&released.reference, "settled");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(wallet = %wallet, reference = %released.reference, error = %e, "payout submission failed");
                self.set_withdrawal_status(&released.reference, "failed");
            }
        }

        Ok(json!({
            "released": released.amount,
            "reference": released.reference,
        }))
    }

    fn register(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let wallet = wallet_param(params)?;
        let created = self
            .ledger
            .store()
            .ensure_account(wallet.as_str(), unix_now())
            .map_err(store_err)?;
        Ok(json!({ "registered": created }))
    }

    fn summary(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let wallet = wallet_param(params)?;
        let store = self.ledger.store();
        let referrals = store.referrals_count(wallet.as_str()).map_err(store_err)?;
        let account = store.get_account(wallet.as_str()).map_err(store_err)?;

        Ok(match account {
            Some(row) => json!({
                "exists": true,
                "referrer": row.referrer,
                "locked_reward": row.locked_reward,
                "total_earned": row.total_earned,
                "team_volume": row.team_volume,
                "month_volume": row.month_volume,
                "last_vesting_time": row.last_vesting_time,
                "referrals": referrals,
            }),
            None => json!({
                "exists": false,
                "referrer": Value::Null,
                "locked_reward": 0,
                "total_earned": 0,
                "team_volume": 0,
                "month_volume": 0,
                "referrals": referrals,
            }),
        })
    }

    fn leaderboard(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let limit = params
            .as_ref()
            .and_then(|p| p.get("limit"))
            .and_then(Value::as_u64)
            .unwrap_or(50)
            .min(200) as u32;

        let rows = self.ledger.store().leaderboard(limit).map_err(store_err)?;
        let rows: Vec<Value> = rows
            .into_iter()
            .map(|r| {
                json!({
                    "wallet": r.wallet,
                    "referrals": r.referrals,
                    "locked_reward": r.locked_reward,
                    "total_earned": r.total_earned,
                    "team_volume": r.team_volume,
                })
            })
            .collect();
        Ok(json!(rows))
    }

    fn set_withdrawal_status(&self, reference: &str, status: &str) {
        if let Err(e) = self.ledger.store().set_withdrawal_status(reference, status) {
            warn!(reference, status, error = %e, "failed to update withdrawal status");
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.ok_or_else(|| rpc_err(code::INVALID_PARAMS, "missing params".into()))?;
    serde_json::from_value(params).map_err(|e| rpc_err(code::INVALID_PARAMS, e.to_string()))
}

fn wallet_param(params: Option<Value>) -> Result<WalletAddr, RpcError> {
    let raw = params
        .as_ref()
        .and_then(|p| p.get("wallet"))
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_err(code::INVALID_PARAMS, "missing wallet".into()))?;
    WalletAddr::parse(raw).map_err(|e| rpc_err(code::INVALID_PARAMS, e.to_string()))
}

fn rpc_err(code: i32, message: String) -> RpcError {
    RpcError { code, message }
}

fn store_err(e: StoreError) -> RpcError {
    match e {
        StoreError::Busy => rpc_err(code::RETRYABLE, "store busy, retry".into()),
        other => rpc_err(code::INTERNAL, other.to_string()),
    }
}
