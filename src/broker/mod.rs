//! Broker integration.
//!
//! Defines the `BrokerClient` trait and provides the OANDA v20 REST
//! implementation. The reconciler only ever sees this trait, so the
//! ladder math is testable against an injected in-memory fake.

pub mod oanda;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AccountSnapshot, OrderRequest, OrderReceipt};

/// Abstraction over the brokerage account the ladder is maintained on.
///
/// Implementors provide the three capabilities a pass needs: read the
/// live order book, submit one resting order, cancel one order.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Fetch the current pending orders and open trades for the account.
    /// Fails with a transport/auth error on a non-2xx response.
    async fn account_snapshot(&self, account_id: &str) -> Result<AccountSnapshot>;

    /// Submit a resting entry order with its attached take-profit exit.
    async fn submit_resting_order(
        &self,
        account_id: &str,
        request: &OrderRequest,
    ) -> Result<OrderReceipt>;

    /// Cancel a pending order by id.
    async fn cancel_order(&self, account_id: &str, order_id: &str) -> Result<()>;

    /// Broker name for logging and identification.
    fn name(&self) -> &str;
}
