//! OANDA v20 REST integration.
//!
//! API docs: https://developer.oanda.com/rest-live-v20/introduction/
//! Practice base: https://api-fxpractice.oanda.com
//! Live base:     https://api-fxtrade.oanda.com
//! Auth: `Authorization: Bearer {token}`.
//!
//! Prices travel as decimal strings on the wire; they are parsed into
//! `Decimal` on the way in and rendered back to strings on the way out,
//! already rounded by the caller.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BrokerClient;
use crate::config::Environment;
use crate::types::{AccountSnapshot, OpenTrade, OrderKind, OrderReceipt, OrderRequest, PendingOrder};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const PRACTICE_BASE_URL: &str = "https://api-fxpractice.oanda.com";
const LIVE_BASE_URL: &str = "https://api-fxtrade.oanda.com";
const BROKER_NAME: &str = "oanda";

/// Hard per-request timeout; a request that exceeds it surfaces as a
/// fetch or submission failure for the current pass.
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// API response types (v20 JSON → Rust)
// ---------------------------------------------------------------------------

/// `GET /v3/accounts/{id}` envelope. We only deserialize what we need.
#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: AccountBody,
}

#[derive(Debug, Deserialize)]
struct AccountBody {
    #[serde(default)]
    orders: Vec<WireOrder>,
    #[serde(default)]
    trades: Vec<WireTrade>,
}

/// A pending order as v20 serializes it. Exit orders (take-profit) carry
/// `tradeID` instead of `instrument`; market orders carry no price.
#[derive(Debug, Deserialize)]
struct WireOrder {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    instrument: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default, rename = "tradeID")]
    trade_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTrade {
    id: String,
    instrument: String,
    price: String,
}

/// `POST /v3/accounts/{id}/orders` response envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    #[serde(default)]
    order_create_transaction: Option<CreateTransaction>,
}

#[derive(Debug, Deserialize)]
struct CreateTransaction {
    id: String,
}

// ---------------------------------------------------------------------------
// API request types (Rust → v20 JSON)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct OrderEnvelope<'a> {
    order: MarketIfTouchedBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketIfTouchedBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    instrument: &'a str,
    units: String,
    price: String,
    time_in_force: &'static str,
    take_profit_on_fill: TakeProfitDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TakeProfitDetails {
    price: String,
    time_in_force: &'static str,
}

impl<'a> OrderEnvelope<'a> {
    fn from_request(request: &'a OrderRequest) -> Self {
        Self {
            order: MarketIfTouchedBody {
                kind: OrderKind::MarketIfTouched.as_wire(),
                instrument: &request.instrument,
                units: request.units.to_string(),
                price: request.price.to_string(),
                time_in_force: request.time_in_force.as_wire(),
                take_profit_on_fill: TakeProfitDetails {
                    price: request.take_profit_price.to_string(),
                    time_in_force: request.time_in_force.as_wire(),
                },
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// OANDA v20 REST client.
pub struct OandaClient {
    http: Client,
    token: SecretString,
    base_url: String,
}

impl OandaClient {
    /// Create a client for the given environment.
    pub fn new(environment: Environment, token: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("landbuyer/0.1.0")
            .build()
            .context("Failed to build HTTP client for OANDA")?;

        let base_url = match environment {
            Environment::Practice => PRACTICE_BASE_URL,
            Environment::Live => LIVE_BASE_URL,
        };

        Ok(Self {
            http,
            token,
            base_url: base_url.to_string(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    fn parse_price(raw: &str) -> Result<Decimal> {
        raw.parse::<Decimal>()
            .with_context(|| format!("Unparseable price from OANDA: {raw:?}"))
    }
}

fn snapshot_from_body(body: AccountBody) -> Result<AccountSnapshot> {
    let mut orders = Vec::with_capacity(body.orders.len());
    for order in body.orders {
        // Market orders have no price; nothing for the ladder to match on.
        let Some(raw_price) = order.price else {
            continue;
        };
        orders.push(PendingOrder {
            id: order.id,
            kind: OrderKind::from_wire(&order.kind),
            instrument: order.instrument,
            price: OandaClient::parse_price(&raw_price)?,
            trade_id: order.trade_id,
        });
    }

    let trades = body
        .trades
        .into_iter()
        .map(|t| {
            Ok(OpenTrade {
                id: t.id,
                instrument: t.instrument,
                price: OandaClient::parse_price(&t.price)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AccountSnapshot { orders, trades })
}

#[async_trait]
impl BrokerClient for OandaClient {
    async fn account_snapshot(&self, account_id: &str) -> Result<AccountSnapshot> {
        let url = format!("{}/v3/accounts/{account_id}", self.base_url);
        debug!(url = %url, "Fetching account snapshot");

        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .context("OANDA account request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OANDA account fetch error {status}: {body}");
        }

        let parsed: AccountResponse = resp
            .json()
            .await
            .context("Failed to parse OANDA account response")?;

        snapshot_from_body(parsed.account)
    }

    async fn submit_resting_order(
        &self,
        account_id: &str,
        request: &OrderRequest,
    ) -> Result<OrderReceipt> {
        let url = format!("{}/v3/accounts/{account_id}/orders", self.base_url);
        debug!(url = %url, order = %request, "Submitting resting order");

        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&OrderEnvelope::from_request(request))
            .send()
            .await
            .context("OANDA order request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OANDA order create error {status}: {body}");
        }

        let parsed: CreateOrderResponse = resp
            .json()
            .await
            .context("Failed to parse OANDA order create response")?;

        let order_id = parsed
            .order_create_transaction
            .map(|tx| tx.id)
            .context("OANDA order create response carried no transaction id")?;

        Ok(OrderReceipt {
            order_id,
            instrument: request.instrument.clone(),
            price: request.price,
            take_profit_price: request.take_profit_price,
            submitted_at: Utc::now(),
        })
    }

    async fn cancel_order(&self, account_id: &str, order_id: &str) -> Result<()> {
        let url = format!(
            "{}/v3/accounts/{account_id}/orders/{order_id}/cancel",
            self.base_url
        );
        debug!(url = %url, "Cancelling order");

        let resp = self
            .http
            .put(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .context("OANDA cancel request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OANDA order cancel error {status}: {body}");
        }

        Ok(())
    }

    fn name(&self) -> &str {
        BROKER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
