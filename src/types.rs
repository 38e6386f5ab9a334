//! Shared types for the SURGE agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that exchange, analysis,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// A single OHLCV sample over a fixed time bucket.
///
/// A series of candles for one instrument is immutable once fetched and
/// recomputed fresh on every scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// Chart pattern detected over the tail of a candle series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    Uptrend,
    None,
}

impl Pattern {
    pub fn is_none(&self) -> bool {
        matches!(self, Pattern::None)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Uptrend => write!(f, "uptrend"),
            Pattern::None => write!(f, "none"),
        }
    }
}

/// A scored instrument produced by the indicator engine.
///
/// Read-only after creation; the shared latest-signal slot is replaced
/// wholesale each scan cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    /// Heuristic confidence score, 0–100.
    pub confidence: u8,
    pub pattern: Pattern,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// Whether this signal clears the auto-trade bar at the given threshold.
    pub fn is_tradeable(&self, threshold: u8) -> bool {
        self.confidence >= threshold && !self.pattern.is_none()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | confidence: {}% | pattern: {}",
            self.symbol, self.confidence, self.pattern,
        )
    }
}

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

/// A tradable market pair as listed by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub quote_asset: String,
    /// Exchange trading status, e.g. "TRADING" or "BREAK".
    pub status: String,
}

impl Instrument {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Receipt returned after an order is placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub symbol: String,
    /// Base-asset quantity bought.
    pub quantity: f64,
    /// Quote-asset amount spent.
    pub quote_spent: f64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl OrderReceipt {
    /// Create a dry-run receipt (no real execution).
    pub fn dry_run(symbol: &str, quantity: f64) -> Self {
        Self {
            order_id: format!("dry-run-{}", uuid::Uuid::new_v4()),
            symbol: symbol.to_string(),
            quantity,
            quote_spent: 0.0,
            status: "DRY_RUN".to_string(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for OrderReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} qty={:.3} spent={:.2} ({})",
            self.status, self.symbol, self.quantity, self.quote_spent, self.order_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Trade state
// ---------------------------------------------------------------------------

/// Process-wide trading state. Mutated only by the trade executor after a
/// successful order; read on every executor invocation to gate new trades.
/// Not persisted — reset on process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeState {
    /// No new trade may be placed while `now < cooldown_until`.
    pub cooldown_until: DateTime<Utc>,
    /// The instrument currently held under cooldown, if any.
    pub active_symbol: Option<String>,
    pub trades_placed: u64,
}

impl Default for TradeState {
    fn default() -> Self {
        Self {
            cooldown_until: DateTime::<Utc>::UNIX_EPOCH,
            active_symbol: None,
            trades_placed: 0,
        }
    }
}

impl TradeState {
    /// Whether the post-trade quiet period is still running.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        now < self.cooldown_until
    }

    /// Record a successful order: arm the cooldown and mark the instrument
    /// active.
    pub fn arm_cooldown(&mut self, now: DateTime<Utc>, cooldown: chrono::Duration, symbol: &str) {
        self.cooldown_until = now + cooldown;
        self.active_symbol = Some(symbol.to_string());
        self.trades_placed += 1;
    }
}

// ---------------------------------------------------------------------------
// Scan statistics
// ---------------------------------------------------------------------------

/// Rolling counters written by the scanner, read by the status surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub cycles: u64,
    pub symbols_evaluated: u64,
    pub alerts_sent: u64,
}

// ---------------------------------------------------------------------------
// Shared bot state
// ---------------------------------------------------------------------------

/// The shared state both scheduler loops and the HTTP surface operate on.
///
/// Single writer per field: the scanner writes `latest_signal` and `stats`,
/// the executor writes `trade`. Everything else only reads.
#[derive(Debug)]
pub struct BotState {
    pub latest_signal: RwLock<Option<Signal>>,
    pub trade: RwLock<TradeState>,
    pub stats: RwLock<ScanStats>,
    pub started_at: DateTime<Utc>,
}

impl BotState {
    pub fn new() -> Self {
        Self {
            latest_signal: RwLock::new(None),
            trade: RwLock::new(TradeState::default()),
            stats: RwLock::new(ScanStats::default()),
            started_at: Utc::now(),
        }
    }

    /// Uptime since agent start.
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

impl Default for BotState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SURGE.
#[derive(Debug, thiserror::Error)]
pub enum SurgeError {
    #[error("Exchange error ({endpoint}): {message}")]
    Exchange { endpoint: String, message: String },

    #[error("Insufficient data: need {needed} samples, have {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notify(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
