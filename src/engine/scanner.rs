//! Batched market scanner.
//!
//! Enumerates every eligible instrument (settlement-asset quote, actively
//! trading, not a leveraged token), evaluates them in fixed-size batches
//! through the indicator engine, and returns at most one qualifying signal
//! per scan — first match wins, remaining instruments are not evaluated.
//! Inter-batch pauses bound API pressure.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::analysis;
use crate::config::AppConfig;
use crate::exchange::SpotExchange;
use crate::notify::Notify;
use crate::types::{BotState, Instrument, Signal};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Candle interval fed to the indicator engine.
const KLINE_INTERVAL: &str = "15m";

/// Lookback window, in candles.
const KLINE_LOOKBACK: u32 = 100;

/// Leveraged-token name prefixes to the quote asset; `BTCUPUSDT` and
/// `BTCDOWNUSDT` move multiples of the underlying and are excluded.
const LEVERAGED_SUFFIXES: &[&str] = &["UP", "DOWN"];

/// Chat notice sent when a full scan yields nothing tradable.
const NO_SIGNAL_NOTICE: &str = "⚠️ No strong signal found. Waiting before next scan.";

/// Scanner cadences and thresholds, derived from [`AppConfig`].
///
/// Pauses are plain durations so tests can run with zero waits.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub quote_asset: String,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub rescan_pause: Duration,
    pub alert_confidence: u8,
    pub trade_confidence: u8,
}

impl ScanSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            quote_asset: cfg.scanner.quote_asset.clone(),
            batch_size: cfg.scanner.batch_size,
            batch_pause: Duration::from_secs(cfg.scanner.batch_pause_secs),
            rescan_pause: Duration::from_secs(cfg.agent.rescan_interval_secs),
            alert_confidence: cfg.thresholds.alert_confidence,
            trade_confidence: cfg.thresholds.trade_confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub struct MarketScanner {
    exchange: Arc<dyn SpotExchange>,
    notifier: Arc<dyn Notify>,
    settings: ScanSettings,
}

impl MarketScanner {
    pub fn new(
        exchange: Arc<dyn SpotExchange>,
        notifier: Arc<dyn Notify>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            exchange,
            notifier,
            settings,
        }
    }

    /// Run one full scan cycle.
    ///
    /// Publishes the first qualifying signal to `state.latest_signal` and
    /// returns it, short-circuiting the rest of the batch plan. The
    /// latest-signal slot is replaced wholesale: cleared up front, set only
    /// on a qualifying result.
    pub async fn scan(&self, state: &BotState) -> Result<Option<Signal>> {
        *state.latest_signal.write().await = None;
        state.stats.write().await.cycles += 1;

        let symbols = self.eligible_symbols().await;
        info!(eligible = symbols.len(), "Starting market scan");

        let total_batches = symbols.len().div_ceil(self.settings.batch_size.max(1));

        for (index, batch) in symbols.chunks(self.settings.batch_size.max(1)).enumerate() {
            info!(
                batch = index + 1,
                total = total_batches,
                size = batch.len(),
                "Scanning batch"
            );

            for symbol in batch {
                state.stats.write().await.symbols_evaluated += 1;

                let signal = match self.evaluate_symbol(symbol).await {
                    Ok(Some(signal)) => signal,
                    Ok(None) => {
                        debug!(symbol = %symbol, "Not enough data, skipping");
                        continue;
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Evaluation failed, skipping");
                        continue;
                    }
                };

                if signal.confidence >= self.settings.alert_confidence {
                    state.stats.write().await.alerts_sent += 1;
                    self.notifier.send(&alert_message(&signal)).await;
                }

                if signal.is_tradeable(self.settings.trade_confidence) {
                    info!(signal = %signal, "Qualifying signal found — stopping scan");
                    *state.latest_signal.write().await = Some(signal.clone());
                    return Ok(Some(signal));
                }
            }

            tokio::time::sleep(self.settings.batch_pause).await;
        }

        info!("Scan complete, no qualifying signal");
        self.notifier.send(NO_SIGNAL_NOTICE).await;
        tokio::time::sleep(self.settings.rescan_pause).await;

        Ok(None)
    }

    // -- Eligibility -------------------------------------------------------

    /// All symbols worth evaluating this cycle.
    ///
    /// A universe-fetch failure is a scan-level event: the operator is
    /// notified and the scan proceeds over an empty universe rather than
    /// aborting the loop.
    async fn eligible_symbols(&self) -> Vec<String> {
        match self.exchange.list_instruments().await {
            Ok(instruments) => instruments
                .iter()
                .filter(|i| self.is_eligible(i))
                .map(|i| i.symbol.clone())
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to fetch instrument universe");
                self.notifier
                    .send(&format!("❌ Error fetching tradable pairs: {e}"))
                    .await;
                Vec::new()
            }
        }
    }

    fn is_eligible(&self, instrument: &Instrument) -> bool {
        instrument.quote_asset == self.settings.quote_asset
            && instrument.is_trading()
            && !self.is_leveraged_token(&instrument.symbol)
    }

    fn is_leveraged_token(&self, symbol: &str) -> bool {
        LEVERAGED_SUFFIXES
            .iter()
            .any(|suffix| symbol.ends_with(&format!("{suffix}{}", self.settings.quote_asset)))
    }

    // -- Evaluation --------------------------------------------------------

    /// Fetch candles and score one instrument.
    ///
    /// `Ok(None)` means the series was too short to evaluate — skip without
    /// alerting. `Err` means the fetch itself failed.
    async fn evaluate_symbol(&self, symbol: &str) -> Result<Option<Signal>> {
        let candles = self
            .exchange
            .get_candles(symbol, KLINE_INTERVAL, KLINE_LOOKBACK)
            .await?;

        match analysis::evaluate(symbol, &candles) {
            Ok(signal) => Ok(Some(signal)),
            Err(e) => {
                debug!(symbol, error = %e, "No signal from analysis");
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

fn alert_message(signal: &Signal) -> String {
    format!(
        "📈 Signal found: {} | Confidence: {}% | Pattern: {}",
        signal.symbol, signal.confidence, signal.pattern,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
