//! Attribution: turning validated purchases into commission credits.

use serde::Serialize;
use tracing::{debug, info, warn};

use refvest_core::{calculate_commission, usd_value};
use refvest_store::PurchaseEventRow;

use crate::event::{validate_report, PurchaseReport, ReportReject, ValidPurchase};
use crate::Ledger;

/// Per-batch accounting, returned as the ingestion acknowledgement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Reports in the batch.
    pub received: u64,
    /// Events written (including zero-reward records).
    pub recorded: u64,
    /// Events that credited a referrer.
    pub credited: u64,
    /// Signatures already processed by an earlier delivery.
    pub duplicates: u64,
    /// Reports dropped by validation or a store failure.
    pub skipped: u64,
}

impl Ledger {
    /// Process one ingestion batch against a single price snapshot.
    ///
    /// Every report is handled independently: a malformed report, a
    /// duplicate signature, or a store failure on one event never aborts
    /// its siblings. At-least-once delivery upstream plus the
    /// signature-keyed insert downstream makes redelivery harmless.
    pub fn process_batch(
        &self,
        reports: &[serde_json::Value],
        price: f64,
        now: i64,
    ) -> BatchSummary {
        let mut summary = BatchSummary {
            received: reports.len() as u64,
            ..BatchSummary::default()
        };

        for raw in reports {
            let report: PurchaseReport = match serde_json::from_value(raw.clone()) {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "unparseable report, skipped");
                    summary.skipped += 1;
                    continue;
                }
            };

            match validate_report(&report, &self.config().reward_mint) {
                Ok(valid) => self.attribute(&valid, price, now, &mut summary),
                Err(ReportReject::NonPositiveAmount) => {
                    // Recorded with zero credit: the signature is real and
                    // must still act as a dedup witness.
                    let event = PurchaseEventRow {
                        signature: report.signature.clone(),
                        buyer: report.fee_payer.clone(),
                        referrer: None,
                        token_amount: 0,
                        usd_value: 0,
                        reward_amount: 0,
                        created_at: now,
                    };
                    self.record(&event, &mut summary);
                }
                Err(reject) => {
                    debug!(signature = %report.signature, ?reject, "report skipped");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            received = summary.received,
            recorded = summary.recorded,
            credited = summary.credited,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            "batch processed"
        );
        summary
    }

    /// Attribute one validated purchase at the batch's price snapshot.
    fn attribute(&self, purchase: &ValidPurchase, price: f64, now: i64, summary: &mut BatchSummary) {
        let usd = usd_value(purchase.token_units, price);

        // A buyer the ledger has never seen has no referrer; the event is
        // still recorded as audit trail.
        let referrer = match self.store().get_account(purchase.buyer.as_str()) {
            Ok(account) => account.and_then(|a| a.referrer),
            Err(e) => {
                warn!(signature = %purchase.signature, error = %e, "buyer lookup failed, skipped");
                summary.skipped += 1;
                return;
            }
        };

        let reward = if referrer.is_some() {
            calculate_commission(purchase.token_units, self.config().commission_rate_bps)
        } else {
            0
        };

        let event = PurchaseEventRow {
            signature: purchase.signature.clone(),
            buyer: purchase.buyer.as_str().into(),
            referrer,
            token_amount: purchase.token_units,
            usd_value: usd,
            reward_amount: reward,
            created_at: now,
        };
        self.record(&event, summary);
    }

    fn record(&self, event: &PurchaseEventRow, summary: &mut BatchSummary) {
        match self.store().record_event_and_credit(event) {
            Ok(true) => {
                summary.recorded += 1;
                if event.reward_amount > 0 {
                    summary.credited += 1;
                    info!(
                        signature = %event.signature,
                        referrer = event.referrer.as_deref().unwrap_or(""),
                        reward = event.reward_amount,
                        usd_value = event.usd_value,
                        "commission credited"
                    );
                }
            }
            Ok(false) => summary.duplicates += 1,
            Err(e) => {
                warn!(signature = %event.signature, error = %e, "event write failed, skipped");
                summary.skipped += 1;
            }
        }
    }
}
