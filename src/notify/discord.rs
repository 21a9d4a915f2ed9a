use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{Alert, AlertKind, Notifier};

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[derive(Serialize, Debug)]
struct DiscordEmbed {
    title: String,
    description: String,
}

#[derive(Serialize, Debug)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_alert(alert: &Alert) -> Self {
        match alert.kind {
            AlertKind::Notice => Self {
                content: Some(alert.text.clone()),
                embeds: Vec::new(),
            },
            AlertKind::Headline => {
                let title = if alert.entity_id.is_empty() {
                    "Headline".to_string()
                } else {
                    alert.entity_id.clone()
                };
                let description = if alert.source.is_empty() {
                    alert.text.clone()
                } else {
                    format!("{}\n*{}*", alert.text, alert.source)
                };
                Self {
                    content: None,
                    embeds: vec![DiscordEmbed { title, description }],
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = DiscordWebhookPayload::from_alert(alert);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("discord webhook HTTP error: {}", e.without_url()),
                },
                Err(e) => anyhow!("discord webhook request failed: {}", e.without_url()),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headline_becomes_embed_notice_becomes_content() {
        let p = DiscordWebhookPayload::from_alert(&Alert::headline("BEL wins order", "nuvama", "BEL"));
        assert!(p.content.is_none());
        assert_eq!(p.embeds[0].title, "BEL");
        assert_eq!(p.embeds[0].description, "BEL wins order\n*nuvama*");

        let n = DiscordWebhookPayload::from_alert(&Alert::notice("Monitor restarted"));
        assert_eq!(n.content.as_deref(), Some("Monitor restarted"));
        assert!(n.embeds.is_empty());
    }

    #[test]
    fn retries_never_drop_below_one_attempt() {
        let d = DiscordNotifier::new("http://x".into()).with_retries(0);
        assert_eq!(d.max_retries, 1);
    }

    #[tokio::test]
    async fn failed_attempts_back_off_before_giving_up() {
        let d = DiscordNotifier::new("http://127.0.0.1:9/hook".into())
            .with_timeout(Duration::from_secs(2))
            .with_retries(2);
        let started = std::time::Instant::now();
        let err = d.send(&Alert::notice("Monitor restarted")).await.unwrap_err();
        assert!(err.to_string().contains("discord webhook"));
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
