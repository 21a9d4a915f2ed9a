use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{Alert, AlertKind, Notifier};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn slack_text(alert: &Alert) -> String {
    match alert.kind {
        AlertKind::Notice => alert.text.clone(),
        AlertKind::Headline if alert.entity_id.is_empty() => {
            format!("{} _({})_", alert.text, alert.source)
        }
        AlertKind::Headline => format!("*{}*: {} _({})_", alert.entity_id, alert.text, alert.source),
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let body = serde_json::json!({ "text": slack_text(alert) });

        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("slack post")?
            .error_for_status()
            .map_err(|e| e.without_url())
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_mentions_entity_and_source() {
        assert_eq!(
            slack_text(&Alert::headline("BEL wins order", "nuvama", "BEL")),
            "*BEL*: BEL wins order _(nuvama)_"
        );
        assert_eq!(
            slack_text(&Alert::headline("Sensex flat", "wire", "")),
            "Sensex flat _(wire)_"
        );
        assert_eq!(slack_text(&Alert::notice("hi")), "hi");
    }
}
