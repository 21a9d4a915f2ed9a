use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{Alert, Notifier};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API `sendMessage`, HTML parse mode, link previews off.
#[derive(Clone)]
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            api_base: TELEGRAM_API_BASE.to_string(),
            token,
            chat_id,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point at a different Bot API host (local bot server, tests).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    /// Headline text is escaped so stray `<` or `&` cannot break HTML mode.
    fn message_body(&self, alert: &Alert) -> SendMessage<'_> {
        SendMessage {
            chat_id: &self.chat_id,
            text: html_escape::encode_text(alert.text.trim()).to_string(),
            parse_mode: "HTML",
            disable_web_page_preview: true,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let rsp = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&self.message_body(alert))
            .send()
            .await
            .map_err(|e| anyhow!("telegram request failed: {}", e.without_url()))?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(anyhow!("telegram non-2xx response: {status}"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_escapes_html_and_disables_previews() {
        let t = TelegramNotifier::new("T".into(), "42".into());
        let body = t.message_body(&Alert::headline("  M&M <Q3> profit up ", "nuvama", "M&M"));
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["chat_id"], "42");
        assert_eq!(v["text"], "M&amp;M &lt;Q3&gt; profit up");
        assert_eq!(v["parse_mode"], "HTML");
        assert_eq!(v["disable_web_page_preview"], true);
    }

    #[test]
    fn endpoint_embeds_token() {
        let t = TelegramNotifier::new("123:abc".into(), "1".into()).with_api_base("http://localhost:8081/");
        assert_eq!(t.endpoint(), "http://localhost:8081/bot123:abc/sendMessage");
    }

    #[tokio::test]
    async fn unreachable_api_is_an_error() {
        let t = TelegramNotifier::new("T".into(), "1".into())
            .with_api_base("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        assert!(t.send(&Alert::notice("hello")).await.is_err());
    }
}
