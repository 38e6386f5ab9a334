//! Operator notifications.
//!
//! Fire-and-forget chat messages: a failed send is logged and swallowed,
//! never propagated. The engine depends on the `Notify` trait so tests can
//! record messages instead of hitting Telegram.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramNotifier;

/// Outbound operator notification channel.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Send a message. Transport errors are swallowed (logged at warn).
    async fn send(&self, text: &str);
}

/// No-op notifier used when the chat channel is disabled.
pub struct NullNotifier;

#[async_trait]
impl Notify for NullNotifier {
    async fn send(&self, text: &str) {
        tracing::debug!(text, "Notification channel disabled, dropping message");
    }
}
