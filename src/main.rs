//! BOLD Protocol Monitor
//!
//! Watches the Liquity v2 (BOLD) contracts on Ethereum mainnet and posts to
//! Slack:
//! - Trove opens, closes, adjustments and interest rate changes, with LTV
//! - Liquidations, redemptions and batch manager changes
//! - A daily summary of mint/burn, repayment and stability pool flows

use anyhow::{Context, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use monitor_api::{Notifier, SlackNotifier};
use monitor_chain::AlloyChainClient;
use monitor_core::{
    load_config, AssetRegistry, JsonFileStore, MonitorConfig, Poller, PollerSettings,
};

type MonitorPoller = Poller<AlloyChainClient, SlackNotifier, JsonFileStore>;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = load_config()?;
    config.log_config();

    let notifier = SlackNotifier::new(config.slack_webhook_url.clone());

    let mut poller = match initialize(&config, notifier.clone()).await {
        Ok(poller) => poller,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Startup failed");
            report(&notifier, &format!("Monitor startup error: {e:#}")).await;
            return Err(e);
        }
    };

    info!(
        interval_secs = config.poll.interval_secs,
        assets = poller.registry().len(),
        "Starting poll loop"
    );

    let mut ticker = interval(config.poll.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match poller.run_cycle().await {
            Ok(cycle) => info!(
                head = cycle.head,
                window = ?cycle.window,
                messages = cycle.messages_sent,
                daily = cycle.daily.is_some(),
                "Cycle finished"
            ),
            Err(e) => {
                error!(error = %e, "Cycle failed");
                report(&notifier, &format!("Monitor cycle error: {e}")).await;
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,monitor_core=debug,monitor_chain=debug"));

    // LOG_FORMAT=json for machine-readable output
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

async fn initialize(config: &MonitorConfig, notifier: SlackNotifier) -> Result<MonitorPoller> {
    info!("Initializing components...");

    let chain = AlloyChainClient::connect(config.rpc_url.clone())
        .await
        .context("Failed to connect to RPC")?;

    let registry = AssetRegistry::from_config(config)?
        .resolve_feeds(&chain)
        .await
        .context("Failed to resolve price feeds")?;
    info!(asset_count = registry.len(), "Asset registry loaded");

    let settings = PollerSettings::from_config(config)?;
    let store = JsonFileStore::new(&config.state_file, config.poll.deployment_block);

    Ok(Poller::new(chain, notifier, store, registry, settings))
}

/// Best-effort error notification.
async fn report(notifier: &SlackNotifier, text: &str) {
    if let Err(e) = notifier.send(text).await {
        warn!(error = %e, "Failed to send error notification");
    }
}
