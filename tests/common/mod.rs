//! Deterministic in-memory broker for integration testing.
//!
//! All state is held behind mutexes and fully controllable from test
//! code: fetches can be made to fail, individual trigger prices can be
//! rejected, and (in absorbing mode) accepted submissions show up as
//! resting orders in later snapshots, which is how two-pass idempotence
//! is exercised without a live account.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use landbuyer::broker::BrokerClient;
use landbuyer::types::{
    AccountSnapshot, OpenTrade, OrderKind, OrderReceipt, OrderRequest, PendingOrder,
};

pub struct FakeBroker {
    snapshot: Mutex<AccountSnapshot>,
    submitted: Mutex<Vec<OrderRequest>>,
    cancelled: Mutex<Vec<String>>,
    /// Fail this many account fetches before succeeding again.
    fetch_failures: Mutex<u32>,
    /// Trigger prices whose submissions are rejected.
    rejected_prices: Mutex<HashSet<Decimal>>,
    /// When set, accepted submissions appear as resting orders in
    /// subsequent snapshots.
    absorb_submissions: bool,
    next_order_id: AtomicU64,
}

impl FakeBroker {
    pub fn new(snapshot: AccountSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            fetch_failures: Mutex::new(0),
            rejected_prices: Mutex::new(HashSet::new()),
            absorb_submissions: false,
            next_order_id: AtomicU64::new(1000),
        }
    }

    /// A broker whose book absorbs every accepted submission.
    pub fn absorbing(snapshot: AccountSnapshot) -> Self {
        Self {
            absorb_submissions: true,
            ..Self::new(snapshot)
        }
    }

    /// Make the next `n` account fetches fail.
    pub fn fail_next_fetches(&self, n: u32) {
        *self.fetch_failures.lock().unwrap() = n;
    }

    /// Reject any submission with this trigger price.
    pub fn reject_price(&self, price: Decimal) {
        self.rejected_prices.lock().unwrap().insert(price);
    }

    /// Every request accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.lock().unwrap().clone()
    }

    /// Ids of every order cancelled so far.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Current book contents (for asserting on absorb/cancel effects).
    pub fn book(&self) -> AccountSnapshot {
        self.snapshot.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerClient for FakeBroker {
    async fn account_snapshot(&self, _account_id: &str) -> Result<AccountSnapshot> {
        {
            let mut failures = self.fetch_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(anyhow!("simulated account outage"));
            }
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn submit_resting_order(
        &self,
        _account_id: &str,
        request: &OrderRequest,
    ) -> Result<OrderReceipt> {
        if self.rejected_prices.lock().unwrap().contains(&request.price) {
            return Err(anyhow!("ORDER_REJECTED at {}", request.price));
        }

        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.submitted.lock().unwrap().push(request.clone());

        if self.absorb_submissions {
            self.snapshot.lock().unwrap().orders.push(PendingOrder {
                id: order_id.clone(),
                kind: OrderKind::MarketIfTouched,
                instrument: Some(request.instrument.clone()),
                price: request.price,
                trade_id: None,
            });
        }

        Ok(OrderReceipt {
            order_id,
            instrument: request.instrument.clone(),
            price: request.price,
            take_profit_price: request.take_profit_price,
            submitted_at: Utc::now(),
        })
    }

    async fn cancel_order(&self, _account_id: &str, order_id: &str) -> Result<()> {
        let mut snapshot = self.snapshot.lock().unwrap();
        let before = snapshot.orders.len();
        snapshot.orders.retain(|o| o.id != order_id);
        if snapshot.orders.len() == before {
            return Err(anyhow!("ORDER_DOESNT_EXIST: {order_id}"));
        }
        self.cancelled.lock().unwrap().push(order_id.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ---------------------------------------------------------------------------
// Snapshot builders
// ---------------------------------------------------------------------------

pub fn take_profit_order(id: &str, pair: &str, price: Decimal) -> PendingOrder {
    PendingOrder {
        id: id.to_string(),
        kind: OrderKind::TakeProfit,
        instrument: Some(pair.to_string()),
        price,
        trade_id: None,
    }
}

pub fn ladder_order(id: &str, pair: &str, price: Decimal) -> PendingOrder {
    PendingOrder {
        id: id.to_string(),
        kind: OrderKind::MarketIfTouched,
        instrument: Some(pair.to_string()),
        price,
        trade_id: None,
    }
}

pub fn open_trade(id: &str, pair: &str, price: Decimal) -> OpenTrade {
    OpenTrade {
        id: id.to_string(),
        instrument: pair.to_string(),
        price,
    }
}
