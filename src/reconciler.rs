//! Pass-by-pass ladder reconciliation.
//!
//! One `run_pass` call performs the full fetch → classify → plan →
//! submit → prune cycle for every configured instrument. Instruments are
//! independent: a fetch failure or an empty reference set skips that
//! instrument for the pass and the loop moves on. Within an instrument,
//! rung submissions are issued concurrently and each outcome is recorded
//! on its own; one rejected rung never aborts the rest.
//!
//! The reconciler keeps no order state of its own. Everything is derived
//! from the snapshot fetched at the start of the instrument's turn, so a
//! failed submission is simply retried by a later pass once the broker's
//! book still shows the gap.

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::broker::BrokerClient;
use crate::config::{AnchorSource, InstrumentConfig};
use crate::ladder::{round_price, LadderGeometry, LadderPlan, PlannedOrder};
use crate::types::{
    AccountSnapshot, InstrumentOutcome, InstrumentReport, LandbuyerError, OrderKind, OrderRequest,
    PassReport, TimeInForce,
};

// ---------------------------------------------------------------------------
// Snapshot classification
// ---------------------------------------------------------------------------

/// The slice of an account snapshot one instrument's ladder math sees.
#[derive(Debug, Default)]
struct InstrumentView {
    /// Anchor prices, rounded to the instrument precision.
    reference_prices: Vec<Decimal>,
    /// Resting ladder orders: (order id, rounded price).
    ladder_orders: Vec<(String, Decimal)>,
}

/// Partition the snapshot's orders for one instrument.
///
/// Take-profit orders without an instrument of their own are attributed
/// through the trade they close.
fn classify(snapshot: &AccountSnapshot, cfg: &InstrumentConfig) -> InstrumentView {
    let round = |p: Decimal| round_price(p, cfg.price_decimals);

    let mut view = InstrumentView::default();
    let mut take_profits = Vec::new();

    for order in &snapshot.orders {
        let belongs = match &order.instrument {
            Some(symbol) => *symbol == cfg.pair,
            None => order
                .trade_id
                .as_deref()
                .and_then(|id| snapshot.trade_instrument(id))
                == Some(cfg.pair.as_str()),
        };
        if !belongs {
            continue;
        }

        match order.kind {
            OrderKind::TakeProfit => take_profits.push(round(order.price)),
            OrderKind::MarketIfTouched => {
                view.ladder_orders.push((order.id.clone(), round(order.price)));
            }
            OrderKind::Other => {}
        }
    }

    view.reference_prices = match cfg.anchor_source {
        AnchorSource::TakeProfits => take_profits,
        AnchorSource::OpenTrades => snapshot
            .trades
            .iter()
            .filter(|t| t.instrument == cfg.pair)
            .map(|t| round(t.price))
            .collect(),
    };

    view
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct LadderReconciler {
    broker: Arc<dyn BrokerClient>,
    account_id: String,
    instruments: Vec<InstrumentConfig>,
    pass_count: u64,
}

impl LadderReconciler {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        account_id: impl Into<String>,
        instruments: Vec<InstrumentConfig>,
    ) -> Self {
        Self {
            broker,
            account_id: account_id.into(),
            instruments,
            pass_count: 0,
        }
    }

    /// Run one full reconciliation pass over every configured instrument.
    ///
    /// Never fails: every error is contained at instrument or rung
    /// granularity and recorded in the returned report.
    pub async fn run_pass(&mut self) -> PassReport {
        self.pass_count += 1;
        let started_at = Utc::now();
        info!(
            pass = self.pass_count,
            broker = self.broker.name(),
            instruments = self.instruments.len(),
            "Starting reconciliation pass"
        );

        let mut reports = Vec::with_capacity(self.instruments.len());
        for cfg in &self.instruments {
            reports.push(self.reconcile_instrument(cfg).await);
        }

        PassReport {
            pass_number: self.pass_count,
            started_at,
            instruments: reports,
        }
    }

    async fn reconcile_instrument(&self, cfg: &InstrumentConfig) -> InstrumentReport {
        // Fresh snapshot per instrument: the book may have moved while the
        // previous instrument was being processed.
        let snapshot = match self.broker.account_snapshot(&self.account_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = LandbuyerError::Fetch {
                    instrument: cfg.pair.clone(),
                    message: e.to_string(),
                };
                warn!(instrument = %cfg.pair, error = %err, "Skipping instrument this pass");
                return InstrumentReport::skipped(
                    &cfg.pair,
                    InstrumentOutcome::FetchFailed(e.to_string()),
                );
            }
        };

        let view = classify(&snapshot, cfg);
        let resting: Vec<Decimal> = view.ladder_orders.iter().map(|(_, p)| *p).collect();

        let geometry = LadderGeometry::from_config(cfg);
        let plan = match LadderPlan::build(&geometry, &view.reference_prices, &resting) {
            Ok(plan) => plan,
            Err(_) => {
                let err = LandbuyerError::DegenerateInput {
                    instrument: cfg.pair.clone(),
                };
                warn!(instrument = %cfg.pair, error = %err, "Skipping instrument this pass");
                return InstrumentReport::skipped(&cfg.pair, InstrumentOutcome::SkippedNoReference);
            }
        };

        info!(
            instrument = %cfg.pair,
            high_anchor = %plan.high_anchor,
            low_anchor = %plan.low_anchor,
            resting = resting.len(),
            missing = plan.to_place.len(),
            "Ladder computed"
        );

        // Each rung is an independent broker request; submit them all
        // concurrently and observe each completion on its own.
        let outcomes = join_all(
            plan.to_place
                .iter()
                .map(|rung| self.submit_rung(cfg, rung)),
        )
        .await;
        let placed = outcomes.iter().filter(|ok| **ok).count() as u32;
        let failed = outcomes.len() as u32 - placed;

        let (cancelled, cancel_failed) = if cfg.prune_stale_rungs {
            self.prune_stale(cfg, &plan, &view.ladder_orders).await
        } else {
            (0, 0)
        };

        InstrumentReport {
            pair: cfg.pair.clone(),
            outcome: InstrumentOutcome::Reconciled,
            high_anchor: Some(plan.high_anchor),
            low_anchor: Some(plan.low_anchor),
            placed,
            failed,
            cancelled,
            cancel_failed,
        }
    }

    async fn submit_rung(&self, cfg: &InstrumentConfig, rung: &PlannedOrder) -> bool {
        let request = OrderRequest {
            instrument: cfg.pair.clone(),
            units: cfg.units,
            price: rung.entry,
            take_profit_price: rung.take_profit,
            time_in_force: TimeInForce::Gtc,
        };

        match self
            .broker
            .submit_resting_order(&self.account_id, &request)
            .await
        {
            Ok(receipt) => {
                info!(instrument = %cfg.pair, receipt = %receipt, "Rung placed");
                true
            }
            Err(e) => {
                let err = LandbuyerError::Submission {
                    instrument: cfg.pair.clone(),
                    price: rung.entry,
                    message: e.to_string(),
                };
                warn!(error = %err, "Rung submission failed");
                false
            }
        }
    }

    /// Cancel resting ladder orders outside the desired band. Orders
    /// inside the band (the anchor gap included) are left alone.
    async fn prune_stale(
        &self,
        cfg: &InstrumentConfig,
        plan: &LadderPlan,
        ladder_orders: &[(String, Decimal)],
    ) -> (u32, u32) {
        let stale: Vec<&(String, Decimal)> = ladder_orders
            .iter()
            .filter(|(_, price)| !plan.is_within_band(*price))
            .collect();

        if stale.is_empty() {
            return (0, 0);
        }

        info!(
            instrument = %cfg.pair,
            stale = stale.len(),
            floor = %plan.floor,
            ceiling = %plan.ceiling,
            "Pruning stale rungs"
        );

        let outcomes = join_all(stale.iter().map(|(id, price)| async move {
            match self.broker.cancel_order(&self.account_id, id).await {
                Ok(()) => {
                    info!(instrument = %cfg.pair, order_id = %id, price = %price, "Stale rung cancelled");
                    true
                }
                Err(e) => {
                    warn!(
                        instrument = %cfg.pair,
                        order_id = %id,
                        error = %e,
                        "Stale rung cancel failed"
                    );
                    false
                }
            }
        }))
        .await;

        let cancelled = outcomes.iter().filter(|ok| **ok).count() as u32;
        (cancelled, outcomes.len() as u32 - cancelled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
