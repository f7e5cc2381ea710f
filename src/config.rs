//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API token, account id) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`. All validation is
//! fail-fast at startup: a malformed instrument never reaches the
//! reconciler mid-pass.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::ladder::round_price;
use crate::types::LandbuyerError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub broker: BrokerConfig,
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Minimum gap between reconciliation passes, in milliseconds.
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    pub environment: Environment,
    /// Env var holding the v20 API bearer token.
    pub api_token_env: String,
    /// Env var holding the account id to reconcile.
    pub account_id_env: String,
}

/// Broker environment selector: paper trading or real money.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Practice,
    Live,
}

impl Environment {
    pub fn is_live(&self) -> bool {
        matches!(self, Environment::Live)
    }
}

/// Which price set anchors the ladder.
///
/// Every mainline variant of the strategy anchors on take-profit prices;
/// anchoring directly on open-trade prices is kept as an option.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorSource {
    #[default]
    TakeProfits,
    OpenTrades,
}

/// Per-instrument ladder parameters. Immutable after startup validation.
#[derive(Debug, Deserialize, Clone)]
pub struct InstrumentConfig {
    /// Currency pair, e.g. "TRY_JPY".
    pub pair: String,
    /// Signed position size per rung; the sign is the trade direction.
    pub units: i64,
    /// Signed price offset of the attached take-profit exit.
    pub take_profit_distance: Decimal,
    /// Spacing between rungs, in pips (divided by 100 for the price step).
    pub rung_spacing_pips: Decimal,
    /// Rungs maintained on each side are 1..rung_count-1.
    pub rung_count: u32,
    /// Decimal places all prices for this pair are rounded to.
    pub price_decimals: u32,
    #[serde(default)]
    pub anchor_source: AnchorSource,
    #[serde(default = "default_prune")]
    pub prune_stale_rungs: bool,
}

fn default_prune() -> bool {
    true
}

impl InstrumentConfig {
    /// The rung spacing expressed in price units.
    pub fn price_step(&self) -> Decimal {
        self.rung_spacing_pips / Decimal::ONE_HUNDRED
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Validate the configuration. Any violation is fatal at startup.
    pub fn validate(&self) -> Result<(), LandbuyerError> {
        let fail = |msg: String| Err(LandbuyerError::Config(msg));

        if self.agent.interval_ms == 0 {
            return fail("agent.interval_ms must be positive".to_string());
        }
        if self.instruments.is_empty() {
            return fail("at least one [[instruments]] entry is required".to_string());
        }

        let mut seen = HashSet::new();
        for inst in &self.instruments {
            let pair = inst.pair.as_str();
            if pair.is_empty() || !pair.contains('_') {
                return fail(format!("instrument pair {pair:?} is not a BASE_QUOTE symbol"));
            }
            if !seen.insert(pair) {
                return fail(format!("instrument {pair} is configured twice"));
            }
            if inst.units == 0 {
                return fail(format!("{pair}: units must be non-zero"));
            }
            if inst.take_profit_distance.is_zero() {
                return fail(format!("{pair}: take_profit_distance must be non-zero"));
            }
            if inst.rung_spacing_pips <= Decimal::ZERO {
                return fail(format!("{pair}: rung_spacing_pips must be positive"));
            }
            if inst.rung_count < 2 {
                return fail(format!("{pair}: rung_count must be at least 2"));
            }
            if inst.price_decimals > 12 {
                return fail(format!("{pair}: price_decimals must be at most 12"));
            }
            // The step must survive rounding at this pair's precision,
            // otherwise every rung collapses onto its anchor.
            if round_price(inst.price_step(), inst.price_decimals).is_zero() {
                return fail(format!(
                    "{pair}: rung_spacing_pips {} rounds to zero at {} decimals",
                    inst.rung_spacing_pips, inst.price_decimals,
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
