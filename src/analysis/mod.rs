//! Indicator engine — pure evaluation of a candle series into a signal.
//!
//! No I/O happens here: the scanner fetches candles, this module scores
//! them. Fixed window parameters live here as constants, not config.

pub mod indicators;

pub use indicators::{
    detect_pattern, evaluate, score, IndicatorSnapshot, MIN_SAMPLES,
};
