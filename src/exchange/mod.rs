//! Exchange integrations.
//!
//! Defines the `SpotExchange` trait and provides the Binance REST
//! implementation. The engine only ever talks to the trait, so tests can
//! substitute a deterministic in-memory exchange.

pub mod binance;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Candle, Instrument, OrderReceipt};

#[cfg(test)]
use mockall::automock;

/// Abstraction over a spot exchange.
///
/// Implementors provide instrument listing, candle retrieval, balance
/// queries, and market-buy order placement.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpotExchange: Send + Sync {
    /// List every instrument the exchange offers, tradable or not.
    async fn list_instruments(&self) -> Result<Vec<Instrument>>;

    /// Fetch up to `limit` most recent candles at the given interval.
    async fn get_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>>;

    /// Current price for a symbol.
    async fn get_price(&self, symbol: &str) -> Result<f64>;

    /// Free (unlocked) balance for an asset.
    async fn get_balance(&self, asset: &str) -> Result<f64>;

    /// Place a market buy order for the given base-asset quantity.
    async fn place_market_buy(&self, symbol: &str, quantity: f64) -> Result<OrderReceipt>;

    /// Exchange name for logging and identification.
    fn name(&self) -> &str;
}
