// src/notify/mod.rs
//! Alert delivery. Every channel implements `Notifier`; `NotifierMux` fans an
//! alert out to all configured channels and reports success when at least one
//! accepted it. Failures are logged and returned as `false`, never retried
//! within the same cycle.

pub mod discord;
pub mod slack;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;
pub use telegram::TelegramNotifier;

use crate::types::preview;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Headline,
    /// Operational message, e.g. the startup notice.
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub text: String,
    pub source: String,
    pub entity_id: String,
}

impl Alert {
    pub fn headline(text: &str, source: &str, entity_id: &str) -> Self {
        Self {
            kind: AlertKind::Headline,
            text: text.trim().to_string(),
            source: source.to_string(),
            entity_id: entity_id.to_string(),
        }
    }

    pub fn notice(text: &str) -> Self {
        Self {
            kind: AlertKind::Notice,
            text: text.to_string(),
            source: String::new(),
            entity_id: String::new(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Writes alerts to the log only; used when no channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        tracing::info!(
            target: "notify",
            source = %alert.source,
            entity = %alert.entity_id,
            "ALERT: {}",
            preview(&alert.text, 160)
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        if channels.is_empty() {
            return Self::log_only();
        }
        Self { channels }
    }

    pub fn log_only() -> Self {
        Self {
            channels: vec![Box::new(LogNotifier)],
        }
    }

    /// Channels from env: `TELEGRAM_TOKEN` + `TELEGRAM_CHAT_ID`,
    /// `DISCORD_WEBHOOK_URL` (with optional `DISCORD_MAX_ATTEMPTS`),
    /// `SLACK_WEBHOOK_URL`. Falls back to log-only.
    pub fn from_env(timeout: Duration) -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

        match (var("TELEGRAM_TOKEN"), var("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat)) => {
                channels.push(Box::new(TelegramNotifier::new(token, chat).with_timeout(timeout)))
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(target: "notify", "telegram needs both TELEGRAM_TOKEN and TELEGRAM_CHAT_ID; disabled")
            }
            (None, None) => {}
        }
        if let Some(url) = var("DISCORD_WEBHOOK_URL") {
            let attempts = parse_attempts(var("DISCORD_MAX_ATTEMPTS").as_deref());
            channels.push(Box::new(
                DiscordNotifier::new(url)
                    .with_timeout(timeout)
                    .with_retries(attempts),
            ));
        }
        if let Some(url) = var("SLACK_WEBHOOK_URL") {
            channels.push(Box::new(SlackNotifier::new(url).with_timeout(timeout)));
        }

        let mux = Self::new(channels);
        tracing::info!(target: "notify", channels = ?mux.channel_names(), "notifier channels");
        mux
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub async fn send(&self, alert: &Alert) -> bool {
        let mut delivered = false;
        for ch in &self.channels {
            match ch.send(alert).await {
                Ok(()) => delivered = true,
                Err(e) => tracing::warn!(
                    target: "notify",
                    channel = ch.name(),
                    error = %format!("{e:#}"),
                    headline = %preview(&alert.text, 70),
                    "delivery failed"
                ),
            }
        }
        delivered
    }

    /// `true` when at least one channel accepted the headline.
    pub async fn deliver(&self, text: &str, source: &str, entity_id: &str) -> bool {
        self.send(&Alert::headline(text, source, entity_id)).await
    }

    pub async fn notice(&self, text: &str) -> bool {
        self.send(&Alert::notice(text)).await
    }
}

/// Delivery attempts per alert, 1..=5; anything unparseable means one.
fn parse_attempts(raw: Option<&str>) -> u8 {
    raw.and_then(|v| v.trim().parse::<u8>().ok())
        .unwrap_or(1)
        .clamp(1, 5)
}
