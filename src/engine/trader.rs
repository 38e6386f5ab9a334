//! Cooldown-gated trade executor.
//!
//! Consumes the latest qualifying signal and decides whether to place a
//! single market buy. Preconditions short-circuit in order: cooldown,
//! signal strength, balance floor. A successful order arms the cooldown
//! and notifies the operator; a failed order mutates nothing and is not
//! retried. Buy-only, fire-and-forget.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::exchange::SpotExchange;
use crate::notify::Notify;
use crate::types::{BotState, OrderReceipt, Signal};

// ---------------------------------------------------------------------------
// Settings & outcomes
// ---------------------------------------------------------------------------

/// Executor thresholds and sizing, derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct TradeSettings {
    pub quote_asset: String,
    pub trade_confidence: u8,
    pub min_quote_balance: f64,
    pub balance_usage_ratio: f64,
    pub cooldown: Duration,
    pub dry_run: bool,
}

impl TradeSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            quote_asset: cfg.scanner.quote_asset.clone(),
            trade_confidence: cfg.thresholds.trade_confidence,
            min_quote_balance: cfg.trading.min_quote_balance,
            balance_usage_ratio: cfg.trading.balance_usage_ratio,
            cooldown: Duration::seconds(cfg.trading.cooldown_secs as i64),
            dry_run: cfg.trading.dry_run,
        }
    }
}

/// Why a trade check ended without an order.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The post-trade quiet period is still running.
    CooldownActive,
    /// The signal does not clear the auto-trade bar.
    WeakSignal(u8),
    /// Free settlement balance is below the trading floor.
    InsufficientBalance(f64),
    /// Price lookup failed or returned zero.
    PriceUnavailable,
    /// Sizing rounded down to nothing.
    ZeroQuantity,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CooldownActive => write!(f, "cooldown active"),
            SkipReason::WeakSignal(c) => write!(f, "signal too weak ({c}%)"),
            SkipReason::InsufficientBalance(b) => write!(f, "insufficient balance ({b:.2})"),
            SkipReason::PriceUnavailable => write!(f, "price unavailable"),
            SkipReason::ZeroQuantity => write!(f, "quantity rounds to zero"),
        }
    }
}

/// Typed result of one executor invocation.
#[derive(Debug, Clone)]
pub enum TradeOutcome {
    /// No signal published since the last scan.
    NoSignal,
    /// A precondition failed; nothing was mutated.
    Skipped(SkipReason),
    /// The order (or a required lookup) failed; nothing was mutated.
    Failed(String),
    /// Order placed and cooldown armed.
    Executed(OrderReceipt),
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeOutcome::NoSignal => write!(f, "no signal"),
            TradeOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            TradeOutcome::Failed(e) => write!(f, "failed: {e}"),
            TradeOutcome::Executed(receipt) => write!(f, "executed: {receipt}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sizing
// ---------------------------------------------------------------------------

/// Order size: the configured fraction of the free balance at the current
/// price, rounded to 3 decimal places.
pub fn trade_quantity(balance: f64, usage_ratio: f64, price: f64) -> f64 {
    round3(balance * usage_ratio / price)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct TradeExecutor {
    exchange: Arc<dyn SpotExchange>,
    notifier: Arc<dyn Notify>,
    settings: TradeSettings,
}

impl TradeExecutor {
    pub fn new(
        exchange: Arc<dyn SpotExchange>,
        notifier: Arc<dyn Notify>,
        settings: TradeSettings,
    ) -> Self {
        Self {
            exchange,
            notifier,
            settings,
        }
    }

    /// Run one trade check against the latest published signal.
    ///
    /// Never returns an error: every failure mode folds into the outcome so
    /// the trade loop can log it and carry on. Only a successful order
    /// mutates `state.trade`.
    pub async fn run_once(&self, state: &BotState) -> TradeOutcome {
        let Some(signal) = state.latest_signal.read().await.clone() else {
            return TradeOutcome::NoSignal;
        };

        let now = Utc::now();

        if state.trade.read().await.in_cooldown(now) {
            debug!("Cooldown active, skipping trade");
            return TradeOutcome::Skipped(SkipReason::CooldownActive);
        }

        if !signal.is_tradeable(self.settings.trade_confidence) {
            info!(signal = %signal, "Signal not strong enough for a trade");
            return TradeOutcome::Skipped(SkipReason::WeakSignal(signal.confidence));
        }

        let balance = match self.exchange.get_balance(&self.settings.quote_asset).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "Balance lookup failed");
                return TradeOutcome::Failed(e.to_string());
            }
        };

        if balance < self.settings.min_quote_balance {
            info!(balance, floor = self.settings.min_quote_balance, "Insufficient balance to trade");
            return TradeOutcome::Skipped(SkipReason::InsufficientBalance(balance));
        }

        let price = match self.exchange.get_price(&signal.symbol).await {
            Ok(price) if price > 0.0 => price,
            Ok(_) => {
                warn!(symbol = %signal.symbol, "Zero price, aborting trade");
                return TradeOutcome::Skipped(SkipReason::PriceUnavailable);
            }
            Err(e) => {
                warn!(symbol = %signal.symbol, error = %e, "Price lookup failed, aborting trade");
                return TradeOutcome::Skipped(SkipReason::PriceUnavailable);
            }
        };

        let quantity = trade_quantity(balance, self.settings.balance_usage_ratio, price);
        if quantity <= 0.0 {
            warn!(symbol = %signal.symbol, balance, price, "Computed quantity rounds to zero");
            return TradeOutcome::Skipped(SkipReason::ZeroQuantity);
        }

        let receipt = if self.settings.dry_run {
            info!(
                symbol = %signal.symbol,
                quantity,
                "[DRY RUN] Would place market buy"
            );
            OrderReceipt::dry_run(&signal.symbol, quantity)
        } else {
            match self.exchange.place_market_buy(&signal.symbol, quantity).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    error!(symbol = %signal.symbol, error = %e, "Order placement failed");
                    return TradeOutcome::Failed(e.to_string());
                }
            }
        };

        state
            .trade
            .write()
            .await
            .arm_cooldown(now, self.settings.cooldown, &signal.symbol);

        info!(receipt = %receipt, "Trade executed");
        self.notifier
            .send(&success_message(&signal, &receipt, self.settings.dry_run))
            .await;

        TradeOutcome::Executed(receipt)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

fn success_message(signal: &Signal, receipt: &OrderReceipt, dry_run: bool) -> String {
    let prefix = if dry_run { "🧪 [DRY RUN] " } else { "✅ " };
    format!(
        "{prefix}Trade executed: {}\nConfidence: {}%\nQty: {:.3}",
        signal.symbol, signal.confidence, receipt.quantity,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockSpotExchange;
    use crate::types::Pattern;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notify for RecordingNotifier {
        async fn send(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }

    fn settings() -> TradeSettings {
        TradeSettings {
            quote_asset: "USDT".to_string(),
            trade_confidence: 90,
            min_quote_balance: 10.0,
            balance_usage_ratio: 0.95,
            cooldown: Duration::seconds(120),
            dry_run: false,
        }
    }

    fn executor_with(
        exchange: MockSpotExchange,
        settings: TradeSettings,
    ) -> (TradeExecutor, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let executor = TradeExecutor::new(Arc::new(exchange), notifier.clone(), settings);
        (executor, notifier)
    }

    async fn state_with_signal(confidence: u8, pattern: Pattern) -> BotState {
        let state = BotState::new();
        *state.latest_signal.write().await = Some(Signal {
            symbol: "BTCUSDT".to_string(),
            confidence,
            pattern,
            generated_at: Utc::now(),
        });
        state
    }

    async fn cooldown_until(state: &BotState) -> DateTime<Utc> {
        state.trade.read().await.cooldown_until
    }

    fn filled_receipt(quantity: f64) -> OrderReceipt {
        OrderReceipt {
            order_id: "1".to_string(),
            symbol: "BTCUSDT".to_string(),
            quantity,
            quote_spent: quantity * 50.0,
            status: "FILLED".to_string(),
            timestamp: Utc::now(),
        }
    }

    // -- Sizing ------------------------------------------------------------

    #[test]
    fn test_trade_quantity_rounds_to_three_decimals() {
        // 100 × 0.95 / 3 = 31.666... → 31.667
        assert!((trade_quantity(100.0, 0.95, 3.0) - 31.667).abs() < 1e-12);
        // 100 × 0.95 / 50 = 1.9 exactly
        assert!((trade_quantity(100.0, 0.95, 50.0) - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_trade_quantity_rounds_dust_to_zero() {
        // 10 × 0.95 / 100000 = 0.000095 → 0.000
        assert_eq!(trade_quantity(10.0, 0.95, 100_000.0), 0.0);
    }

    // -- Preconditions, each in isolation ------------------------------------

    #[tokio::test]
    async fn test_no_signal_no_calls() {
        // The mock has no expectations: any exchange call would panic.
        let (executor, notifier) = executor_with(MockSpotExchange::new(), settings());
        let state = BotState::new();

        let outcome = executor.run_once(&state).await;
        assert!(matches!(outcome, TradeOutcome::NoSignal));
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_cooldown_gates_before_anything_else() {
        let (executor, _) = executor_with(MockSpotExchange::new(), settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;
        let armed_until = Utc::now() + Duration::seconds(60);
        state.trade.write().await.cooldown_until = armed_until;

        let outcome = executor.run_once(&state).await;

        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkipReason::CooldownActive)
        ));
        assert_eq!(cooldown_until(&state).await, armed_until);
    }

    #[tokio::test]
    async fn test_weak_signal_is_skipped() {
        let (executor, _) = executor_with(MockSpotExchange::new(), settings());
        let state = state_with_signal(89, Pattern::Uptrend).await;

        let outcome = executor.run_once(&state).await;

        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkipReason::WeakSignal(89))
        ));
    }

    #[tokio::test]
    async fn test_patternless_signal_is_skipped() {
        let (executor, _) = executor_with(MockSpotExchange::new(), settings());
        let state = state_with_signal(95, Pattern::None).await;

        let outcome = executor.run_once(&state).await;

        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkipReason::WeakSignal(95))
        ));
    }

    #[tokio::test]
    async fn test_balance_below_floor_is_skipped() {
        let mut exchange = MockSpotExchange::new();
        exchange.expect_get_balance().returning(|_| Ok(9.99));

        let (executor, _) = executor_with(exchange, settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let outcome = executor.run_once(&state).await;

        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkipReason::InsufficientBalance(_))
        ));
        // Cooldown untouched.
        assert_eq!(cooldown_until(&state).await, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_balance_lookup_failure() {
        let mut exchange = MockSpotExchange::new();
        exchange
            .expect_get_balance()
            .returning(|_| Err(anyhow::anyhow!("account endpoint down")));

        let (executor, _) = executor_with(exchange, settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let outcome = executor.run_once(&state).await;

        assert!(matches!(outcome, TradeOutcome::Failed(_)));
        assert_eq!(cooldown_until(&state).await, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_zero_price_aborts_without_side_effects() {
        let mut exchange = MockSpotExchange::new();
        exchange.expect_get_balance().returning(|_| Ok(100.0));
        exchange.expect_get_price().returning(|_| Ok(0.0));

        let (executor, notifier) = executor_with(exchange, settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let outcome = executor.run_once(&state).await;

        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkipReason::PriceUnavailable)
        ));
        assert_eq!(cooldown_until(&state).await, DateTime::<Utc>::UNIX_EPOCH);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_failed_price_lookup_aborts() {
        let mut exchange = MockSpotExchange::new();
        exchange.expect_get_balance().returning(|_| Ok(100.0));
        exchange
            .expect_get_price()
            .returning(|_| Err(anyhow::anyhow!("ticker down")));

        let (executor, _) = executor_with(exchange, settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let outcome = executor.run_once(&state).await;
        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkipReason::PriceUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_dust_quantity_is_skipped() {
        let mut exchange = MockSpotExchange::new();
        exchange.expect_get_balance().returning(|_| Ok(10.0));
        exchange.expect_get_price().returning(|_| Ok(100_000.0));

        let (executor, _) = executor_with(exchange, settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let outcome = executor.run_once(&state).await;
        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkipReason::ZeroQuantity)
        ));
    }

    // -- Execution -----------------------------------------------------------

    #[tokio::test]
    async fn test_successful_order_arms_cooldown_and_notifies() {
        let mut exchange = MockSpotExchange::new();
        exchange.expect_get_balance().returning(|_| Ok(100.0));
        exchange.expect_get_price().returning(|_| Ok(50.0));
        exchange
            .expect_place_market_buy()
            .withf(|symbol, quantity| symbol == "BTCUSDT" && (quantity - 1.9).abs() < 1e-9)
            .returning(|_, quantity| Ok(filled_receipt(quantity)));

        let (executor, notifier) = executor_with(exchange, settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let before = Utc::now();
        let outcome = executor.run_once(&state).await;
        let after = Utc::now();

        let receipt = match outcome {
            TradeOutcome::Executed(receipt) => receipt,
            other => panic!("expected Executed, got {other}"),
        };
        assert!((receipt.quantity - 1.9).abs() < 1e-9);

        let trade = state.trade.read().await.clone();
        assert!(trade.cooldown_until >= before + Duration::seconds(120));
        assert!(trade.cooldown_until <= after + Duration::seconds(120));
        assert_eq!(trade.active_symbol.as_deref(), Some("BTCUSDT"));
        assert_eq!(trade.trades_placed, 1);

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("BTCUSDT"));
        assert!(messages[0].contains("95%"));
        assert!(messages[0].contains("1.900"));
    }

    #[tokio::test]
    async fn test_failed_order_mutates_nothing() {
        let mut exchange = MockSpotExchange::new();
        exchange.expect_get_balance().returning(|_| Ok(100.0));
        exchange.expect_get_price().returning(|_| Ok(50.0));
        exchange
            .expect_place_market_buy()
            .returning(|_, _| Err(anyhow::anyhow!("MIN_NOTIONAL")));

        let (executor, notifier) = executor_with(exchange, settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let outcome = executor.run_once(&state).await;

        assert!(matches!(outcome, TradeOutcome::Failed(_)));
        assert_eq!(cooldown_until(&state).await, DateTime::<Utc>::UNIX_EPOCH);
        assert!(state.trade.read().await.active_symbol.is_none());
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_trades_without_touching_the_exchange() {
        let mut exchange = MockSpotExchange::new();
        exchange.expect_get_balance().returning(|_| Ok(100.0));
        exchange.expect_get_price().returning(|_| Ok(50.0));
        // No place_market_buy expectation: a real order would panic.

        let dry = TradeSettings {
            dry_run: true,
            ..settings()
        };
        let (executor, notifier) = executor_with(exchange, dry);
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let outcome = executor.run_once(&state).await;

        let receipt = match outcome {
            TradeOutcome::Executed(receipt) => receipt,
            other => panic!("expected Executed, got {other}"),
        };
        assert_eq!(receipt.status, "DRY_RUN");
        assert!(state.trade.read().await.in_cooldown(Utc::now()));
        assert!(notifier.messages()[0].contains("DRY RUN"));
    }

    #[tokio::test]
    async fn test_second_trade_blocked_by_fresh_cooldown() {
        let mut exchange = MockSpotExchange::new();
        exchange.expect_get_balance().returning(|_| Ok(100.0));
        exchange.expect_get_price().returning(|_| Ok(50.0));
        exchange
            .expect_place_market_buy()
            .times(1)
            .returning(|_, quantity| Ok(filled_receipt(quantity)));

        let (executor, _) = executor_with(exchange, settings());
        let state = state_with_signal(95, Pattern::Uptrend).await;

        let first = executor.run_once(&state).await;
        assert!(matches!(first, TradeOutcome::Executed(_)));

        let second = executor.run_once(&state).await;
        assert!(matches!(
            second,
            TradeOutcome::Skipped(SkipReason::CooldownActive)
        ));
    }

    // -- Outcome display -------------------------------------------------------

    #[test]
    fn test_outcome_display() {
        assert_eq!(format!("{}", TradeOutcome::NoSignal), "no signal");
        assert_eq!(
            format!("{}", TradeOutcome::Skipped(SkipReason::CooldownActive)),
            "skipped: cooldown active"
        );
        assert!(format!("{}", TradeOutcome::Skipped(SkipReason::WeakSignal(85)))
            .contains("85%"));
        assert!(
            format!("{}", TradeOutcome::Skipped(SkipReason::InsufficientBalance(9.99)))
                .contains("9.99")
        );
    }
}
