//! SURGE — Autonomous Crypto Momentum Trading Agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the exchange client, notifier and shared state, then runs the
//! scan loop and the trade loop as independent tasks with graceful
//! shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use surge::config::{self, AppConfig};
use surge::engine::scanner::{MarketScanner, ScanSettings};
use surge::engine::trader::{TradeExecutor, TradeOutcome, TradeSettings};
use surge::exchange::binance::BinanceClient;
use surge::exchange::SpotExchange;
use surge::notify::{Notify, NullNotifier, TelegramNotifier};
use surge::server;
use surge::server::routes::ServerState;
use surge::types::BotState;

const BANNER: &str = r#"
 ____  _   _ ____   ____ _____
/ ___|| | | |  _ \ / ___| ____|
\___ \| | | | |_) | |  _|  _|
 ___) | |_| |  _ <| |_| | |___
|____/ \___/|_| \_\\____|_____|

  Signal-driven Uptrend Recognition & Guarded Execution
  v0.1.0 — Autonomous Agent
"#;

/// Pause after a failed loop iteration before retrying.
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging(&cfg);

    // Print startup banner
    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        scan_interval_secs = cfg.agent.scan_interval_secs,
        trade_check_interval_secs = cfg.agent.trade_check_interval_secs,
        quote_asset = %cfg.scanner.quote_asset,
        dry_run = cfg.trading.dry_run,
        "SURGE starting up"
    );

    // -- Initialise components -------------------------------------------

    let exchange: Arc<dyn SpotExchange> = {
        let api_key = config::AppConfig::resolve_env(&cfg.exchange.api_key_env)
            .unwrap_or_default();
        let api_secret = config::AppConfig::resolve_env(&cfg.exchange.api_secret_env)
            .unwrap_or_default();
        if api_key.is_empty() {
            warn!("No exchange API key configured — signed endpoints will be rejected");
        }
        Arc::new(BinanceClient::new(&cfg.exchange.base_url, api_key, api_secret)?)
    };

    let notifier: Arc<dyn Notify> = if cfg.telegram.enabled {
        let token = config::AppConfig::resolve_env(&cfg.telegram.bot_token_env)?;
        let chat_id = config::AppConfig::resolve_env(&cfg.telegram.chat_id_env)?;
        info!("Telegram notifications enabled");
        Arc::new(TelegramNotifier::new(token, chat_id)?)
    } else {
        warn!("Telegram notifications disabled — running silent");
        Arc::new(NullNotifier)
    };

    let state = Arc::new(BotState::new());

    let scanner = MarketScanner::new(
        exchange.clone(),
        notifier.clone(),
        ScanSettings::from_config(&cfg),
    );
    let executor = TradeExecutor::new(
        exchange.clone(),
        notifier.clone(),
        TradeSettings::from_config(&cfg),
    );

    // -- HTTP surface ------------------------------------------------------

    if cfg.server.enabled {
        let operator_chat_id = if cfg.telegram.enabled {
            config::AppConfig::resolve_env(&cfg.telegram.chat_id_env).unwrap_or_default()
        } else {
            String::new()
        };
        let server_state = Arc::new(ServerState {
            bot: state.clone(),
            notifier: notifier.clone(),
            agent_name: cfg.agent.name.clone(),
            operator_chat_id,
        });
        server::spawn_server(server_state, cfg.server.port);
    }

    // -- Scheduler loops ---------------------------------------------------

    let scan_interval = Duration::from_secs(cfg.agent.scan_interval_secs);
    let trade_interval = Duration::from_secs(cfg.agent.trade_check_interval_secs);

    let scan_state = state.clone();
    let scan_handle = tokio::spawn(async move {
        scan_loop(scanner, scan_state, scan_interval).await;
    });

    let trade_state = state.clone();
    let trade_handle = tokio::spawn(async move {
        trade_loop(executor, trade_state, trade_interval).await;
    });

    info!("Entering main loop. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received.");
    scan_handle.abort();
    trade_handle.abort();

    let trade = state.trade.read().await.clone();
    let stats = state.stats.read().await.clone();
    info!(
        cycles = stats.cycles,
        symbols_evaluated = stats.symbols_evaluated,
        trades = trade.trades_placed,
        "SURGE shut down cleanly."
    );

    Ok(())
}

/// Repeatedly scan the market. Self-healing: an error is logged and the
/// loop backs off before retrying — it never terminates the process.
async fn scan_loop(scanner: MarketScanner, state: Arc<BotState>, interval: Duration) {
    loop {
        match scanner.scan(&state).await {
            Ok(Some(signal)) => info!(signal = %signal, "Scan produced a qualifying signal"),
            Ok(None) => debug!("Scan produced no qualifying signal"),
            Err(e) => {
                error!(error = %e, "Scan cycle failed — continuing");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        }
        tokio::time::sleep(interval).await;
    }
}

/// Repeatedly evaluate the latest signal for execution. Same self-healing
/// policy as the scan loop; failures are folded into the outcome.
async fn trade_loop(executor: TradeExecutor, state: Arc<BotState>, interval: Duration) {
    loop {
        match executor.run_once(&state).await {
            TradeOutcome::NoSignal => debug!("No signal to act on"),
            TradeOutcome::Failed(e) => {
                error!(error = %e, "Trade check failed — continuing");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
            outcome => info!(outcome = %outcome, "Trade check complete"),
        }
        tokio::time::sleep(interval).await;
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("surge=info"));

    let json_logging = std::env::var("SURGE_LOG_JSON").is_ok();

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

    let _ = cfg;
}
