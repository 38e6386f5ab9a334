//! Route handlers for the status endpoint and the Telegram webhook.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::notify::Notify;
use crate::types::BotState;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ServerState {
    pub bot: Arc<BotState>,
    pub notifier: Arc<dyn Notify>,
    pub agent_name: String,
    /// Telegram chat id of the operator; commands from anyone else are
    /// silently rejected.
    pub operator_chat_id: String,
}

pub type AppState = Arc<ServerState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub agent: String,
    pub uptime_secs: i64,
    pub scan_cycles: u64,
    pub symbols_evaluated: u64,
    pub alerts_sent: u64,
    pub trades_placed: u64,
    pub latest_signal: Option<String>,
    pub active_symbol: Option<String>,
    pub cooldown_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

// ---------------------------------------------------------------------------
// Telegram webhook payload (we only deserialize the fields we need)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    message: IncomingMessage,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(build_status(&state).await)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// POST /webhook
///
/// Telegram pushes updates here. The payload is taken as raw JSON so a
/// malformed body still gets a negative acknowledgement instead of a 4xx
/// rejection from the extractor.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Json<AckResponse> {
    let update: TelegramUpdate = match serde_json::from_value(payload) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Malformed webhook payload");
            return Json(AckResponse { ok: false });
        }
    };

    let chat_id = update.message.chat.id.to_string();
    if chat_id != state.operator_chat_id {
        warn!(chat_id = %chat_id, "Webhook message from unknown sender, ignoring");
        return Json(AckResponse { ok: false });
    }

    let text = update.message.text.unwrap_or_default();
    info!(command = %text, "Operator command received");

    let reply = match text.trim().to_lowercase().as_str() {
        "/start" => "✅ Bot is already running in auto mode.".to_string(),
        "/status" => status_text(&state).await,
        _ => "❓ Unknown command.".to_string(),
    };
    state.notifier.send(&reply).await;

    Json(AckResponse { ok: true })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn build_status(state: &ServerState) -> StatusResponse {
    let stats = state.bot.stats.read().await.clone();
    let trade = state.bot.trade.read().await.clone();
    let latest_signal = state
        .bot
        .latest_signal
        .read()
        .await
        .as_ref()
        .map(|s| s.to_string());

    let cooldown_active = trade.in_cooldown(chrono::Utc::now());

    StatusResponse {
        status: "running".to_string(),
        agent: state.agent_name.clone(),
        uptime_secs: state.bot.uptime().num_seconds(),
        scan_cycles: stats.cycles,
        symbols_evaluated: stats.symbols_evaluated,
        alerts_sent: stats.alerts_sent,
        trades_placed: trade.trades_placed,
        latest_signal,
        active_symbol: trade.active_symbol,
        cooldown_active,
    }
}

async fn status_text(state: &ServerState) -> String {
    let status = build_status(state).await;
    format!(
        "📊 {} running. Cycles: {} | Evaluated: {} | Alerts: {} | Trades: {}\nLatest signal: {}",
        status.agent,
        status.scan_cycles,
        status.symbols_evaluated,
        status.alerts_sent,
        status.trades_placed,
        status.latest_signal.as_deref().unwrap_or("none"),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
