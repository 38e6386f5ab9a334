//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, bot tokens) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub thresholds: ThresholdsConfig,
    pub scanner: ScannerConfig,
    pub trading: TradingConfig,
    pub exchange: ExchangeConfig,
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub scan_interval_secs: u64,
    pub rescan_interval_secs: u64,
    pub trade_check_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdsConfig {
    /// Confidence at which an informational alert is sent.
    pub alert_confidence: u8,
    /// Confidence at which a trade may be placed.
    pub trade_confidence: u8,
    /// Confidence drop from peak that would trigger an exit.
    /// Reserved: no sell-side consumer is wired yet.
    pub sell_signal_drop: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    /// Settlement asset every eligible instrument must quote against.
    pub quote_asset: String,
    pub batch_size: usize,
    pub batch_pause_secs: u64,
    /// Reserved 24h volume floor for eligibility.
    pub min_volume_24h: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    /// Fraction of the free settlement balance committed per trade.
    pub balance_usage_ratio: f64,
    /// Minimum free settlement balance required to trade at all.
    pub min_quote_balance: f64,
    /// Quiet period after any trade, in seconds.
    pub cooldown_secs: u64,
    /// When set, orders are logged and receipted but never sent.
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub api_secret_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token_env: String,
    pub chat_id_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
