//! Technical indicators and the additive confidence score.
//!
//! A candle series is fed incrementally through a fixed indicator set
//! (EMA, MACD, RSI, stochastic-of-RSI, Bollinger bands, OBV); the final
//! values form an [`IndicatorSnapshot`] which is scored together with the
//! detected chart pattern. Scoring is additive over four independent
//! boolean gates: +60 bullish, +20 uptrend, +10 volatility, +10 volume
//! flow — 100 maximum.

use chrono::Utc;
use ta::indicators::{
    BollingerBands, ExponentialMovingAverage, FastStochastic,
    MovingAverageConvergenceDivergence, OnBalanceVolume, RelativeStrengthIndex,
};
use ta::{Close, High, Low, Next, Open, Volume};

use crate::types::{Candle, Pattern, Signal, SurgeError};

// ---------------------------------------------------------------------------
// Window parameters
// ---------------------------------------------------------------------------

/// Trend-following moving average window, in candles.
const EMA_WINDOW: usize = 14;

/// Momentum oscillator window.
const RSI_WINDOW: usize = 14;

/// Stochastic window applied to the RSI stream.
const STOCH_WINDOW: usize = 14;

/// MACD fast/slow/signal EMA windows.
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Bollinger band window and standard-deviation multiplier.
const BB_WINDOW: usize = 20;
const BB_MULTIPLIER: f64 = 2.0;

/// Number of trailing closes that must strictly increase for an uptrend.
const UPTREND_CANDLES: usize = 5;

/// Minimum series length — the longest indicator warm-up (MACD slow EMA).
pub const MIN_SAMPLES: usize = 26;

// ---------------------------------------------------------------------------
// Scoring thresholds
// ---------------------------------------------------------------------------

/// RSI must exceed this for the bullish condition.
const RSI_BULLISH: f64 = 55.0;

/// Stochastic RSI (%K, 0–100) must exceed this for the bullish condition.
const STOCH_BULLISH: f64 = 60.0;

/// Band width above this counts as meaningful volatility.
const MIN_BAND_WIDTH: f64 = 0.01;

const BULLISH_POINTS: u8 = 60;
const UPTREND_POINTS: u8 = 20;
const VOLATILITY_POINTS: u8 = 10;
const VOLUME_FLOW_POINTS: u8 = 10;

// ---------------------------------------------------------------------------
// ta trait glue
// ---------------------------------------------------------------------------

impl Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl Volume for Candle {
    fn volume(&self) -> f64 {
        self.volume
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Final indicator values after feeding a full candle series.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorSnapshot {
    pub last_close: f64,
    pub ema: f64,
    pub macd_histogram: f64,
    pub rsi: f64,
    pub stoch_rsi: f64,
    pub band_width: f64,
    pub obv: f64,
}

impl IndicatorSnapshot {
    /// The bullish condition: price above its moving average with positive
    /// trend and strong momentum on both oscillators.
    pub fn is_bullish(&self) -> bool {
        self.last_close > self.ema
            && self.macd_histogram > 0.0
            && self.rsi > RSI_BULLISH
            && self.stoch_rsi > STOCH_BULLISH
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Compute the indicator snapshot over a full candle series.
///
/// Errors if the series is shorter than [`MIN_SAMPLES`]; the caller treats
/// that as "no signal", never as an alert.
pub fn compute_snapshot(candles: &[Candle]) -> Result<IndicatorSnapshot, SurgeError> {
    if candles.len() < MIN_SAMPLES {
        return Err(SurgeError::InsufficientData {
            needed: MIN_SAMPLES,
            got: candles.len(),
        });
    }

    let mut ema = ExponentialMovingAverage::new(EMA_WINDOW)
        .map_err(|e| SurgeError::Analysis(e.to_string()))?;
    let mut macd = MovingAverageConvergenceDivergence::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL)
        .map_err(|e| SurgeError::Analysis(e.to_string()))?;
    let mut rsi = RelativeStrengthIndex::new(RSI_WINDOW)
        .map_err(|e| SurgeError::Analysis(e.to_string()))?;
    let mut stoch = FastStochastic::new(STOCH_WINDOW)
        .map_err(|e| SurgeError::Analysis(e.to_string()))?;
    let mut bands = BollingerBands::new(BB_WINDOW, BB_MULTIPLIER)
        .map_err(|e| SurgeError::Analysis(e.to_string()))?;
    let mut obv = OnBalanceVolume::new();

    let mut snapshot = IndicatorSnapshot {
        last_close: 0.0,
        ema: 0.0,
        macd_histogram: 0.0,
        rsi: 0.0,
        stoch_rsi: 0.0,
        band_width: 0.0,
        obv: 0.0,
    };

    for candle in candles {
        let close = candle.close;
        snapshot.last_close = close;
        snapshot.ema = ema.next(close);
        snapshot.macd_histogram = macd.next(close).histogram;
        snapshot.rsi = rsi.next(close);
        snapshot.stoch_rsi = stoch.next(snapshot.rsi);
        let bb = bands.next(close);
        snapshot.band_width = bb.upper - bb.lower;
        snapshot.obv = obv.next(candle);
    }

    Ok(snapshot)
}

/// Detect the chart pattern: `Uptrend` iff the last [`UPTREND_CANDLES`]
/// closes are strictly monotonically increasing.
pub fn detect_pattern(candles: &[Candle]) -> Pattern {
    if candles.len() < UPTREND_CANDLES {
        return Pattern::None;
    }
    let tail = &candles[candles.len() - UPTREND_CANDLES..];
    let rising = tail.windows(2).all(|w| w[0].close < w[1].close);
    if rising {
        Pattern::Uptrend
    } else {
        Pattern::None
    }
}

/// Additive confidence score over four independent boolean gates.
pub fn score(snapshot: &IndicatorSnapshot, pattern: Pattern) -> u8 {
    let mut confidence = 0u8;
    if snapshot.is_bullish() {
        confidence += BULLISH_POINTS;
    }
    if pattern == Pattern::Uptrend {
        confidence += UPTREND_POINTS;
    }
    if snapshot.band_width > MIN_BAND_WIDTH {
        confidence += VOLATILITY_POINTS;
    }
    if snapshot.obv > 0.0 {
        confidence += VOLUME_FLOW_POINTS;
    }
    confidence
}

/// Evaluate a candle series into a scored [`Signal`].
///
/// This is the scanner's entry point. Any error means "produce no signal":
/// the instrument is skipped, not alerted.
pub fn evaluate(symbol: &str, candles: &[Candle]) -> Result<Signal, SurgeError> {
    let snapshot = compute_snapshot(candles)?;
    let pattern = detect_pattern(candles);
    let confidence = score(&snapshot, pattern);

    Ok(Signal {
        symbol: symbol.to_string(),
        confidence,
        pattern,
        generated_at: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
