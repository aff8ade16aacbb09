// src/notify/telegram.rs
use anyhow::{Context, Result};
use reqwest::Client;

use super::compose_digest;

/// Telegram Bot API sender. Without `TELEGRAM_BOT_TOKEN` every send is a
/// logged no-op, so the rest of the pipeline runs unchanged in dev.
pub struct TelegramBot {
    token: Option<String>,
    client: Client,
}

impl TelegramBot {
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("TELEGRAM_BOT_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        )
    }

    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            client: Client::new(),
        }
    }

    /// Channel chat-ID env var, e.g. `CHAT_NEW_YORK`.
    pub fn chat_id_for(channel_key: &str) -> Option<String> {
        std::env::var(format!("CHAT_{}", channel_key.to_uppercase())).ok()
    }

    /// Post a news digest to the channel's chat. A channel without a
    /// configured chat is skipped silently.
    pub async fn send_digest(
        &self,
        channel_key: &str,
        lines: &[String],
        extras: &str,
    ) -> Result<()> {
        let Some(chat_id) = Self::chat_id_for(channel_key) else {
            tracing::debug!(channel = %channel_key, "no chat configured, skipping digest");
            return Ok(());
        };
        let text = compose_digest(channel_key, lines, extras);
        self.send(&chat_id, &text, "Markdown", false).await
    }

    /// Post an HTML message (events digest) to the channel's chat.
    pub async fn send_events(&self, channel_key: &str, html: &str) -> Result<()> {
        let Some(chat_id) = Self::chat_id_for(channel_key) else {
            tracing::debug!(channel = %channel_key, "no chat configured, skipping events");
            return Ok(());
        };
        self.send(&chat_id, html, "HTML", true).await
    }

    /// Operational alert to the private `ALERT_CHAT_ID` channel. Failures
    /// are logged, never propagated: alerting must not take the bot down.
    pub async fn send_alert(&self, msg: &str) {
        let Some(chat_id) = std::env::var("ALERT_CHAT_ID").ok().filter(|c| !c.is_empty()) else {
            tracing::debug!("ALERT_CHAT_ID not set, alert dropped");
            return;
        };
        let text = format!("🚨 <b>Bot Alert</b>\n\n{msg}");
        if let Err(e) = self.send(&chat_id, &text, "HTML", true).await {
            tracing::warn!(error = ?e, "failed to send alert");
        }
    }

    async fn send(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: &str,
        disable_preview: bool,
    ) -> Result<()> {
        let Some(token) = &self.token else {
            tracing::debug!("Telegram disabled (no TELEGRAM_BOT_TOKEN)");
            return Ok(());
        };
        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": parse_mode,
            "disable_web_page_preview": disable_preview,
        });

        self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("telegram post")?
            .error_for_status()
            .context("telegram non-2xx")?;
        Ok(())
    }
}
