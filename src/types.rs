//! Shared types for the LANDBUYER bot.
//!
//! These types form the data model used across all modules: the broker
//! snapshot the reconciler reads, the order request/receipt values it
//! writes, and the per-pass reports it returns. They are designed to be
//! stable so that broker, ladder, and reconciler modules can depend on
//! them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Order classification
// ---------------------------------------------------------------------------

/// The kinds of pending order the reconciler cares about.
///
/// Take-profit orders carry the exit prices the ladder anchors on;
/// market-if-touched orders are the resting ladder rungs themselves.
/// Everything else (stop-loss, trailing, plain limit) is `Other` and
/// ignored by the ladder math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    TakeProfit,
    MarketIfTouched,
    Other,
}

impl OrderKind {
    /// Classify a v20 order `type` string.
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "TAKE_PROFIT" => OrderKind::TakeProfit,
            "MARKET_IF_TOUCHED" => OrderKind::MarketIfTouched,
            _ => OrderKind::Other,
        }
    }

    /// The v20 wire name for this kind.
    pub fn as_wire(&self) -> &'static str {
        match self {
            OrderKind::TakeProfit => "TAKE_PROFIT",
            OrderKind::MarketIfTouched => "MARKET_IF_TOUCHED",
            OrderKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

// ---------------------------------------------------------------------------
// Account snapshot
// ---------------------------------------------------------------------------

/// A pending order as reported by the broker.
///
/// Take-profit orders may omit `instrument` and carry only the id of the
/// trade they close; `AccountSnapshot::trade_instrument` resolves those.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: String,
    pub kind: OrderKind,
    pub instrument: Option<String>,
    pub price: Decimal,
    /// Owning trade for exit orders (take-profit, stop-loss).
    pub trade_id: Option<String>,
}

/// An open trade as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTrade {
    pub id: String,
    pub instrument: String,
    pub price: Decimal,
}

/// Read-only view of the account, fetched fresh every pass and discarded
/// afterwards. The broker's order book is the sole source of truth; nothing
/// here survives across passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub orders: Vec<PendingOrder>,
    pub trades: Vec<OpenTrade>,
}

impl AccountSnapshot {
    /// Number of pending orders in the snapshot.
    pub fn pending_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Look up the instrument of an open trade by id.
    pub fn trade_instrument(&self, trade_id: &str) -> Option<&str> {
        self.trades
            .iter()
            .find(|t| t.id == trade_id)
            .map(|t| t.instrument.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order submission
// ---------------------------------------------------------------------------

/// Time-in-force for submitted orders. The reconciler always uses GTC;
/// the enum mirrors the broker's vocabulary for the wire layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[default]
    Gtc,
    Gfd,
}

impl TimeInForce {
    pub fn as_wire(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Gfd => "GFD",
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// A resting-order submission: one ladder rung plus its attached
/// take-profit exit. This is the only shape the reconciler hands to the
/// broker, keeping vendor order objects out of the ladder logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument: String,
    /// Signed position size; the sign is the trade direction.
    pub units: i64,
    /// Trigger price for the resting entry.
    pub price: Decimal,
    /// Exit price attached on fill.
    pub take_profit_price: Decimal,
    pub time_in_force: TimeInForce,
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}u @ {} (tp {}) [{}]",
            self.instrument, self.units, self.price, self.take_profit_price, self.time_in_force,
        )
    }
}

/// Receipt returned after a resting order is accepted by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub instrument: String,
    pub price: Decimal,
    pub take_profit_price: Decimal,
    pub submitted_at: DateTime<Utc>,
}

impl fmt::Display for OrderReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ {} (tp {})",
            self.order_id, self.instrument, self.price, self.take_profit_price,
        )
    }
}

// ---------------------------------------------------------------------------
// Pass reports
// ---------------------------------------------------------------------------

/// How a single instrument fared within one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentOutcome {
    /// The ladder was computed and acted on.
    Reconciled,
    /// No reference prices; nothing to anchor on this pass.
    SkippedNoReference,
    /// The account snapshot could not be fetched.
    FetchFailed(String),
}

impl fmt::Display for InstrumentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentOutcome::Reconciled => write!(f, "reconciled"),
            InstrumentOutcome::SkippedNoReference => write!(f, "skipped (no reference prices)"),
            InstrumentOutcome::FetchFailed(e) => write!(f, "fetch failed: {e}"),
        }
    }
}

/// Per-instrument summary of one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub pair: String,
    pub outcome: InstrumentOutcome,
    pub high_anchor: Option<Decimal>,
    pub low_anchor: Option<Decimal>,
    pub placed: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub cancel_failed: u32,
}

impl InstrumentReport {
    /// A report for an instrument that never reached the ladder math.
    pub fn skipped(pair: &str, outcome: InstrumentOutcome) -> Self {
        Self {
            pair: pair.to_string(),
            outcome,
            high_anchor: None,
            low_anchor: None,
            placed: 0,
            failed: 0,
            cancelled: 0,
            cancel_failed: 0,
        }
    }
}

impl fmt::Display for InstrumentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pair, self.outcome)?;
        if let (Some(high), Some(low)) = (self.high_anchor, self.low_anchor) {
            write!(f, " anchors=[{low}, {high}]")?;
        }
        write!(
            f,
            " placed={} failed={} cancelled={} cancel_failed={}",
            self.placed, self.failed, self.cancelled, self.cancel_failed,
        )
    }
}

/// Summary of a full reconciliation pass across all instruments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_number: u64,
    pub started_at: DateTime<Utc>,
    pub instruments: Vec<InstrumentReport>,
}

impl PassReport {
    pub fn total_placed(&self) -> u32 {
        self.instruments.iter().map(|r| r.placed).sum()
    }

    pub fn total_failed(&self) -> u32 {
        self.instruments.iter().map(|r| r.failed).sum()
    }

    pub fn total_cancelled(&self) -> u32 {
        self.instruments.iter().map(|r| r.cancelled).sum()
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pass #{}: placed={} failed={} cancelled={}",
            self.pass_number,
            self.total_placed(),
            self.total_failed(),
            self.total_cancelled(),
        )?;
        for report in &self.instruments {
            write!(f, " | {report}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for LANDBUYER.
///
/// Only `Config` is fatal, and only at startup. `Fetch` and
/// `DegenerateInput` skip an instrument for the current pass; `Submission`
/// skips a single rung. The process never terminates on a per-instrument
/// or per-order failure.
#[derive(Debug, thiserror::Error)]
pub enum LandbuyerError {
    #[error("account fetch failed ({instrument}): {message}")]
    Fetch { instrument: String, message: String },

    #[error("no reference prices for {instrument}; ladder has nothing to anchor on")]
    DegenerateInput { instrument: String },

    #[error("order submission failed ({instrument} @ {price}): {message}")]
    Submission {
        instrument: String,
        price: Decimal,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
