//! LANDBUYER — automated resting-order ladder maintenance for OANDA v20
//!
//! Entry point. Loads configuration, applies CLI overrides, initialises
//! structured logging, and runs the fetch→plan→submit reconciliation
//! loop with graceful shutdown. The tick interval is a minimum gap
//! between passes: a pass always completes before the next wait is
//! armed, so passes never overlap.

use anyhow::Result;
use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use landbuyer::broker::oanda::OandaClient;
use landbuyer::config::{AppConfig, Environment};
use landbuyer::reconciler::LadderReconciler;

const BANNER: &str = r#"
 _        _    _   _ ____  ____  _   ___   _______ ____
| |      / \  | \ | |  _ \| __ )| | | \ \ / / ____|  _ \
| |     / _ \ |  \| | | | | |_) | | | |\ V /|  _| | |_) |
| |___ / ___ \| |\  | |_| |  _ <| |_| | | | | |___|  _ <
|_____/_/   \_\_| \_|____/|_| \_\\___/  |_| |_____|_| \_\

  Resting-order ladder maintenance
  v0.1.0
"#;

#[derive(Debug, Parser)]
#[command(name = "landbuyer", about = "Resting-order ladder maintenance for OANDA v20")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured pass interval, in milliseconds.
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Force the practice (paper-trading) environment.
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    let mut cfg = AppConfig::load(&cli.config)?;
    if let Some(interval_ms) = cli.interval {
        cfg.agent.interval_ms = interval_ms;
    }
    if cli.dev {
        cfg.broker.environment = Environment::Practice;
    }

    // Configuration problems are the only fatal errors; fail before any
    // broker traffic.
    cfg.validate()?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        interval_ms = cfg.agent.interval_ms,
        environment = ?cfg.broker.environment,
        instruments = cfg.instruments.len(),
        "LANDBUYER starting up"
    );

    if cfg.broker.environment.is_live() {
        warn!("Live environment selected — orders will commit real funds");
    }

    // -- Secrets and broker client ---------------------------------------

    let token = SecretString::new(AppConfig::resolve_env(&cfg.broker.api_token_env)?);
    let account_id = AppConfig::resolve_env(&cfg.broker.account_id_env)?;

    let broker = Arc::new(OandaClient::new(cfg.broker.environment, token)?);
    let mut reconciler =
        LadderReconciler::new(broker, account_id, cfg.instruments.clone());

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.agent.interval_ms));
    // A pass slower than the interval delays the next tick instead of
    // stacking a second pass on top of it.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_ms = cfg.agent.interval_ms,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = reconciler.run_pass().await;
                info!(
                    pass = report.pass_number,
                    placed = report.total_placed(),
                    failed = report.total_failed(),
                    cancelled = report.total_cancelled(),
                    "Pass complete"
                );
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("LANDBUYER shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("landbuyer=info"));

    let json_logging = std::env::var("LANDBUYER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
