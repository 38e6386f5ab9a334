//! Binance spot REST integration.
//!
//! Public market data (exchangeInfo, klines, ticker) is unauthenticated;
//! account and order endpoints require an API key header plus an
//! HMAC-SHA256 signature over the query string.
//!
//! API docs: https://developers.binance.com/docs/binance-spot-api-docs
//! Base URL: https://api.binance.com

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info};

use super::SpotExchange;
use crate::types::{Candle, Instrument, OrderReceipt, SurgeError};

const EXCHANGE_NAME: &str = "binance";

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// API response types (Binance JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    quote_asset: String,
    status: String,
}

/// A kline as returned by `/api/v3/klines`: a positional JSON array of
/// `[open_time, open, high, low, close, volume, close_time, quote_volume,
/// trades, taker_base, taker_quote, ignore]` with prices as strings.
type KlineRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    i64,
    String,
    String,
    String,
);

#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountInformation {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
    #[allow(dead_code)]
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    symbol: String,
    status: String,
    executed_qty: String,
    cummulative_quote_qty: String,
    transact_time: i64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Binance spot exchange client.
pub struct BinanceClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: Secret<String>,
}

impl BinanceClient {
    /// Create a new Binance client.
    ///
    /// `api_key`/`api_secret` are only exercised by the signed endpoints
    /// (balance, orders); market data is public.
    pub fn new(base_url: &str, api_key: String, api_secret: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("SURGE/0.1.0 (momentum-trading-agent)")
            .build()
            .context("Failed to build HTTP client for Binance")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret: Secret::new(api_secret),
        })
    }

    // -- Internal helpers ------------------------------------------------

    /// HMAC-SHA256 signature over a query string, hex encoded.
    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Append the timestamp and signature Binance requires on private
    /// endpoints.
    fn signed_query(&self, params: &str) -> String {
        let timestamp = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={timestamp}")
        } else {
            format!("{params}&timestamp={timestamp}")
        };
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    async fn check_status(resp: reqwest::Response, endpoint: &str) -> Result<reqwest::Response> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SurgeError::Exchange {
                endpoint: endpoint.to_string(),
                message: format!("{status}: {body}"),
            }
            .into());
        }
        Ok(resp)
    }

    /// Convert a Binance timestamp (ms since epoch) to `DateTime<Utc>`.
    fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
    }

    fn parse_price(value: &str, field: &str) -> Result<f64> {
        value
            .parse::<f64>()
            .with_context(|| format!("Failed to parse {field}: {value}"))
    }

    fn kline_to_candle(row: &KlineRow) -> Result<Candle> {
        Ok(Candle {
            open_time: Self::ms_to_datetime(row.0),
            open: Self::parse_price(&row.1, "kline open")?,
            high: Self::parse_price(&row.2, "kline high")?,
            low: Self::parse_price(&row.3, "kline low")?,
            close: Self::parse_price(&row.4, "kline close")?,
            volume: Self::parse_price(&row.5, "kline volume")?,
        })
    }
}

#[async_trait]
impl SpotExchange for BinanceClient {
    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        debug!(url = %url, "Fetching exchange info");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("exchangeInfo request failed")?;
        let resp = Self::check_status(resp, "/api/v3/exchangeInfo").await?;

        let info: ExchangeInfoResponse = resp
            .json()
            .await
            .context("Failed to parse exchangeInfo response")?;

        Ok(info
            .symbols
            .into_iter()
            .map(|s| Instrument {
                symbol: s.symbol,
                quote_asset: s.quote_asset,
                status: s.status,
            })
            .collect())
    }

    async fn get_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}",
            self.base_url,
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("klines request failed for {symbol}"))?;
        let resp = Self::check_status(resp, "/api/v3/klines").await?;

        let rows: Vec<KlineRow> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse klines response for {symbol}"))?;

        rows.iter().map(Self::kline_to_candle).collect()
    }

    async fn get_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/api/v3/ticker/price?symbol={symbol}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("ticker request failed for {symbol}"))?;
        let resp = Self::check_status(resp, "/api/v3/ticker/price").await?;

        let ticker: TickerPrice = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse ticker response for {symbol}"))?;

        Self::parse_price(&ticker.price, "ticker price")
    }

    async fn get_balance(&self, asset: &str) -> Result<f64> {
        let query = self.signed_query("");
        let url = format!("{}/api/v3/account?{query}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("account request failed")?;
        let resp = Self::check_status(resp, "/api/v3/account").await?;

        let account: AccountInformation = resp
            .json()
            .await
            .context("Failed to parse account response")?;

        match account.balances.iter().find(|b| b.asset == asset) {
            Some(balance) => Self::parse_price(&balance.free, "free balance"),
            None => Ok(0.0),
        }
    }

    async fn place_market_buy(&self, symbol: &str, quantity: f64) -> Result<OrderReceipt> {
        let params = format!("symbol={symbol}&side=BUY&type=MARKET&quantity={quantity}");
        let query = self.signed_query(&params);
        let url = format!("{}/api/v3/order?{query}", self.base_url);

        info!(symbol, quantity, "Placing market buy order");

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .with_context(|| format!("order request failed for {symbol}"))?;
        let resp = Self::check_status(resp, "/api/v3/order").await?;

        let order: OrderResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse order response for {symbol}"))?;

        Ok(OrderReceipt {
            order_id: order.order_id.to_string(),
            symbol: order.symbol,
            quantity: Self::parse_price(&order.executed_qty, "executed quantity")?,
            quote_spent: Self::parse_price(&order.cummulative_quote_qty, "quote spent")?,
            status: order.status,
            timestamp: Self::ms_to_datetime(order.transact_time),
        })
    }

    fn name(&self) -> &str {
        EXCHANGE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
